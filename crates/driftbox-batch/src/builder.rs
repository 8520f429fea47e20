//! Task-list construction for upload and download batches: local/remote
//! tree walks, glob include/exclude filtering, and the
//! trailing-slash-changes-the-target-layout rule.

use driftbox_core::error::DriftboxError;
use driftbox_core::types::{BatchTask, ResolvedKind};
use driftbox_fs::FsContext;
use std::path::{Path, PathBuf};

/// Any-match permit/deny filter pair. An empty include list permits
/// everything; an empty exclude list denies nothing.
pub struct TaskFilter {
    pub include: Vec<glob::Pattern>,
    pub exclude: Vec<glob::Pattern>,
}

impl TaskFilter {
    pub fn new(include: &[String], exclude: &[String]) -> anyhow::Result<Self> {
        let compile = |patterns: &[String]| -> anyhow::Result<Vec<glob::Pattern>> {
            patterns
                .iter()
                .map(|p| glob::Pattern::new(p).map_err(|e| anyhow::anyhow!("bad glob {p:?}: {e}")))
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn allows(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(name));
        let excluded = self.exclude.iter().any(|p| p.matches(name));
        included && !excluded
    }
}

fn collect_local_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect_local_files_inner(root, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect_local_files_inner(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_dir() {
            collect_local_files_inner(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Build the task list for an upload of `sources` into `target_remote`.
/// A directory source ending in `/` spills its contents directly into the
/// target; without the trailing slash, the directory itself is recreated
/// under the target by name.
pub fn build_upload_tasks(
    sources: &[String],
    target_remote: &str,
    recursive: bool,
    filter: &TaskFilter,
) -> anyhow::Result<Vec<BatchTask>> {
    let mut tasks = Vec::new();
    let target = target_remote.trim_end_matches('/');

    for source in sources {
        let spill = source.ends_with('/');
        let local_path = Path::new(source.trim_end_matches('/'));
        let meta = std::fs::metadata(local_path)
            .map_err(|e| anyhow::anyhow!("stat {source}: {e}"))?;

        if meta.is_file() {
            let name = local_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("source has no file name: {source}"))?;
            if filter.allows(name) {
                tasks.push(BatchTask::new_pending(
                    local_path.to_string_lossy().to_string(),
                    format!("{target}/{name}"),
                ));
            }
            continue;
        }

        if !recursive {
            anyhow::bail!("{source} is a directory; pass --recursive to upload it");
        }

        let base_remote = if spill {
            target.to_string()
        } else {
            let dirname = local_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("source has no directory name: {source}"))?;
            format!("{target}/{dirname}")
        };

        for file in collect_local_files(local_path)
            .map_err(|e| anyhow::anyhow!("walking {source}: {e}"))?
        {
            let rel = file.strip_prefix(local_path).unwrap_or(&file);
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if !filter.allows(name) {
                continue;
            }
            tasks.push(BatchTask::new_pending(
                file.to_string_lossy().to_string(),
                format!("{base_remote}/{rel_str}"),
            ));
        }
    }

    Ok(tasks)
}

/// Build the task list for downloading `remote_path` into `local_dest`,
/// walking the remote tree through the listing cache when it names a
/// folder.
pub async fn build_download_tasks(
    ctx: &FsContext,
    root_id: &str,
    remote_path: &str,
    local_dest: &Path,
    recursive: bool,
    filter: &TaskFilter,
) -> Result<Vec<BatchTask>, DriftboxError> {
    let resolved = driftbox_fs::resolve_path(ctx, root_id, remote_path).await?;

    match resolved.kind {
        ResolvedKind::File(file) => {
            if !filter.allows(&file.name) {
                return Ok(Vec::new());
            }
            let dest = local_dest.join(&file.name);
            let mut task = BatchTask::new_pending(dest.to_string_lossy().to_string(), file.id.clone());
            task.remote_last_modified = Some(file.last_modified_ms);
            Ok(vec![task])
        }
        ResolvedKind::Folder(folder) => {
            if !recursive {
                return Err(DriftboxError::Other(anyhow::anyhow!(
                    "{remote_path} is a folder; pass --recursive to download it"
                )));
            }
            let mut tasks = Vec::new();
            walk_remote_folder(ctx, &folder.id, local_dest, filter, &mut tasks).await?;
            Ok(tasks)
        }
    }
}

fn walk_remote_folder<'a>(
    ctx: &'a FsContext,
    folder_id: &'a str,
    local_dir: &'a Path,
    filter: &'a TaskFilter,
    out: &'a mut Vec<BatchTask>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), DriftboxError>> + 'a>> {
    Box::pin(async move {
        let (folders, files) = ctx.list_children(folder_id).await?;

        for file in files {
            if !filter.allows(&file.name) {
                continue;
            }
            let dest = local_dir.join(&file.name);
            let mut task =
                BatchTask::new_pending(dest.to_string_lossy().to_string(), file.id.clone());
            task.remote_last_modified = Some(file.last_modified_ms);
            out.push(task);
        }

        for folder in folders {
            let child_dir = local_dir.join(&folder.name);
            walk_remote_folder(ctx, &folder.id, &child_dir, filter, out).await?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_with_no_patterns_allows_everything() {
        let filter = TaskFilter::new(&[], &[]).unwrap();
        assert!(filter.allows("anything.txt"));
    }

    #[test]
    fn include_restricts_to_matches() {
        let filter = TaskFilter::new(&["*.jpg".to_string()], &[]).unwrap();
        assert!(filter.allows("a.jpg"));
        assert!(!filter.allows("a.png"));
    }

    #[test]
    fn exclude_overrides_include() {
        let filter = TaskFilter::new(&["*".to_string()], &["*.tmp".to_string()]).unwrap();
        assert!(filter.allows("a.txt"));
        assert!(!filter.allows("a.tmp"));
    }

    #[test]
    fn single_file_source_becomes_one_task() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("report.pdf");
        std::fs::write(&file_path, b"hi").unwrap();
        let filter = TaskFilter::new(&[], &[]).unwrap();
        let tasks = build_upload_tasks(
            &[file_path.to_string_lossy().to_string()],
            "/docs",
            false,
            &filter,
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].remote_path, "/docs/report.pdf");
    }

    #[test]
    fn directory_without_trailing_slash_nests_under_its_own_name() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("photos");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("a.jpg"), b"x").unwrap();
        let filter = TaskFilter::new(&[], &[]).unwrap();
        let tasks = build_upload_tasks(
            &[sub.to_string_lossy().to_string()],
            "/backup",
            true,
            &filter,
        )
        .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].remote_path, "/backup/photos/a.jpg");
    }

    #[test]
    fn directory_with_trailing_slash_spills_contents() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("photos");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("a.jpg"), b"x").unwrap();
        let filter = TaskFilter::new(&[], &[]).unwrap();
        let mut source = sub.to_string_lossy().to_string();
        source.push('/');
        let tasks = build_upload_tasks(&[source], "/backup", true, &filter).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].remote_path, "/backup/a.jpg");
    }
}
