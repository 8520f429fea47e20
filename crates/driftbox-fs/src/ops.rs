//! Path mutation and traversal operations: mkdir -p, move, rename, trash,
//! restore, permanent delete, search/find/tree, and single-file copy.

use driftbox_core::error::DriftboxError;
use driftbox_core::types::{FileHandle, FolderHandle, ResolvedKind};
use driftbox_crypto::{decrypt_with_ring, envelope_encrypt, generate_uuid_v4};
use serde::Serialize;
use std::time::Duration;

use crate::context::FsContext;
use crate::resolver;

#[derive(Serialize)]
struct CreateDirRequest<'a> {
    uuid: &'a str,
    name: String,
    #[serde(rename = "nameHashed")]
    name_hashed: String,
    parent: &'a str,
    #[serde(rename = "creationTime", skip_serializing_if = "Option::is_none")]
    creation_time: Option<i64>,
    #[serde(rename = "modificationTime", skip_serializing_if = "Option::is_none")]
    modification_time: Option<i64>,
}

/// Ensure every component of `path` exists as a folder under `root_id`,
/// creating the missing suffix. Only the final component receives the
/// optional timestamps.
pub async fn mkdir_recursive(
    ctx: &FsContext,
    root_id: &str,
    path: &str,
    creation_time_ms: Option<i64>,
    modification_time_ms: Option<i64>,
) -> Result<String, DriftboxError> {
    let (mut parent, missing) = resolver::resolve_existing_prefix(ctx, root_id, path).await?;
    if missing.is_empty() {
        return Ok(parent);
    }

    let last_index = missing.len() - 1;
    for (i, component) in missing.iter().enumerate() {
        let is_last = i == last_index;
        let new_id = generate_uuid_v4();
        let name_hashed = ctx.name_hashed(component);
        let master_key = ctx.master_keys.newest().as_str();
        let name_envelope = envelope_encrypt(master_key, component.as_bytes());

        let req = CreateDirRequest {
            uuid: &new_id,
            name: name_envelope,
            name_hashed,
            parent: &parent,
            creation_time: if is_last { creation_time_ms } else { None },
            modification_time: if is_last { modification_time_ms } else { None },
        };

        let result: Result<serde_json::Value, DriftboxError> = ctx
            .transport
            .post_json("/v3/dir/create", Some(&ctx.api_key), &req)
            .await;

        ctx.cache.invalidate(&parent);

        match result {
            Ok(_) => parent = new_id,
            Err(DriftboxError::HttpStatus { status: 409, .. }) => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                ctx.cache.invalidate(&parent);
                let (folders, _) = ctx.list_children(&parent).await?;
                let winner = folders
                    .into_iter()
                    .find(|f| &f.name == component)
                    .ok_or_else(|| {
                        DriftboxError::Other(anyhow::anyhow!(
                            "folder {component} vanished after a create conflict"
                        ))
                    })?;
                parent = winner.id;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(parent)
}

#[derive(Serialize)]
struct MoveRequest<'a> {
    id: &'a str,
    to: &'a str,
}

pub async fn move_item(
    ctx: &FsContext,
    endpoint: &str,
    id: &str,
    source_parent: &str,
    dest_parent: &str,
) -> Result<(), DriftboxError> {
    if source_parent == dest_parent {
        return Ok(());
    }
    let req = MoveRequest {
        id,
        to: dest_parent,
    };
    let _: serde_json::Value = ctx.transport.post_json(endpoint, Some(&ctx.api_key), &req).await?;
    ctx.cache.invalidate(source_parent);
    ctx.cache.invalidate(dest_parent);
    Ok(())
}

#[derive(Serialize)]
struct RenameFolderRequest<'a> {
    id: &'a str,
    name: String,
    #[serde(rename = "nameHashed")]
    name_hashed: String,
}

pub async fn rename_folder(
    ctx: &FsContext,
    folder: &FolderHandle,
    new_name: &str,
) -> Result<(), DriftboxError> {
    let master_key = ctx.master_keys.newest().as_str();
    let req = RenameFolderRequest {
        id: &folder.id,
        name: envelope_encrypt(master_key, new_name.as_bytes()),
        name_hashed: ctx.name_hashed(new_name),
    };
    let _: serde_json::Value = ctx
        .transport
        .post_json("/v3/dir/rename", Some(&ctx.api_key), &req)
        .await?;
    if let Some(parent) = &folder.parent_id {
        ctx.cache.invalidate(parent);
    }
    Ok(())
}

#[derive(Serialize)]
struct RenameFileRequest<'a> {
    id: &'a str,
    name: String,
    metadata: String,
    #[serde(rename = "nameHashed")]
    name_hashed: String,
}

pub async fn rename_file(
    ctx: &FsContext,
    file: &FileHandle,
    new_name: &str,
) -> Result<(), DriftboxError> {
    let master_key = ctx.master_keys.newest().as_str();
    let metadata_json = serde_json::json!({
        "name": new_name,
        "size": file.size,
        "mime": file.mime,
        "key": file.file_key,
        "hash": file.total_hash,
        "lastModified": file.last_modified_ms,
    });
    let req = RenameFileRequest {
        id: &file.id,
        name: envelope_encrypt(&file.file_key, new_name.as_bytes()),
        metadata: envelope_encrypt(
            master_key,
            serde_json::to_vec(&metadata_json)
                .map_err(|e| DriftboxError::Other(e.into()))?
                .as_slice(),
        ),
        name_hashed: ctx.name_hashed(new_name),
    };
    let _: serde_json::Value = ctx
        .transport
        .post_json("/v3/file/rename", Some(&ctx.api_key), &req)
        .await?;
    ctx.cache.invalidate(&file.parent_id);
    Ok(())
}

#[derive(Serialize)]
struct IdOnlyRequest<'a> {
    id: &'a str,
}

async fn post_id_only(
    ctx: &FsContext,
    endpoint: &str,
    id: &str,
) -> Result<(), DriftboxError> {
    let _: serde_json::Value = ctx
        .transport
        .post_json(endpoint, Some(&ctx.api_key), &IdOnlyRequest { id })
        .await?;
    Ok(())
}

pub async fn trash_folder(ctx: &FsContext, folder: &FolderHandle) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/dir/trash", &folder.id).await?;
    if let Some(parent) = &folder.parent_id {
        ctx.cache.invalidate(parent);
    }
    Ok(())
}

pub async fn trash_file(ctx: &FsContext, file: &FileHandle) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/file/trash", &file.id).await?;
    ctx.cache.invalidate(&file.parent_id);
    Ok(())
}

pub async fn restore_folder(ctx: &FsContext, id: &str) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/dir/restore", id).await
}

pub async fn restore_file(ctx: &FsContext, id: &str) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/file/restore", id).await
}

pub async fn delete_folder_permanent(ctx: &FsContext, folder: &FolderHandle) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/dir/delete/permanent", &folder.id).await?;
    if let Some(parent) = &folder.parent_id {
        ctx.cache.invalidate(parent);
    }
    Ok(())
}

pub async fn delete_file_permanent(ctx: &FsContext, file: &FileHandle) -> Result<(), DriftboxError> {
    post_id_only(ctx, "/v3/file/delete/permanent", &file.id).await?;
    ctx.cache.invalidate(&file.parent_id);
    Ok(())
}

/// A folder or file match yielded by `find`.
#[derive(Debug, Clone)]
pub struct FindMatch {
    pub path: String,
    pub is_folder: bool,
}

/// Iterative depth-first search for files whose name matches `pattern`
/// (case-insensitive glob). Folders are traversed but never matched.
/// `max_depth = -1` means unbounded.
pub async fn find(
    ctx: &FsContext,
    start_folder_id: &str,
    start_path: &str,
    pattern: &str,
    max_depth: i64,
) -> Result<Vec<FindMatch>, DriftboxError> {
    let glob_pattern = glob::Pattern::new(&pattern.to_lowercase())
        .map_err(|e| DriftboxError::Other(anyhow::anyhow!("bad glob pattern: {e}")))?;

    let mut matches = Vec::new();
    let mut stack = vec![(start_folder_id.to_string(), start_path.to_string(), 0i64)];

    while let Some((folder_id, folder_path, depth)) = stack.pop() {
        let (folders, files) = ctx.list_children(&folder_id).await?;

        for file in files {
            if glob_pattern.matches(&file.name.to_lowercase()) {
                matches.push(FindMatch {
                    path: format!("{}/{}", folder_path.trim_end_matches('/'), file.name),
                    is_folder: false,
                });
            }
        }

        if max_depth < 0 || depth < max_depth {
            for folder in folders {
                let child_path = format!("{}/{}", folder_path.trim_end_matches('/'), folder.name);
                stack.push((folder.id, child_path, depth + 1));
            }
        }
    }

    Ok(matches)
}

/// `search` is `find` seeded at the root with an implicit substring glob and
/// no depth bound.
pub async fn search(
    ctx: &FsContext,
    root_id: &str,
    query: &str,
) -> Result<Vec<FindMatch>, DriftboxError> {
    let pattern = format!("*{query}*");
    find(ctx, root_id, "", &pattern, -1).await
}

/// One line of a printed tree.
#[derive(Debug, Clone)]
pub struct TreeLine {
    pub depth: u32,
    pub name: String,
    pub is_folder: bool,
}

/// Bounded depth-first listing for the `tree` command.
pub async fn tree(
    ctx: &FsContext,
    root_folder_id: &str,
    max_depth: u32,
) -> Result<Vec<TreeLine>, DriftboxError> {
    let mut out = Vec::new();
    tree_inner(ctx, root_folder_id, 0, max_depth, &mut out).await?;
    Ok(out)
}

fn tree_inner<'a>(
    ctx: &'a FsContext,
    folder_id: &'a str,
    depth: u32,
    max_depth: u32,
    out: &'a mut Vec<TreeLine>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), DriftboxError>> + 'a>> {
    Box::pin(async move {
        let (mut folders, mut files) = ctx.list_children(folder_id).await?;
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        files.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        for folder in &folders {
            out.push(TreeLine {
                depth,
                name: folder.name.clone(),
                is_folder: true,
            });
            if depth < max_depth {
                tree_inner(ctx, &folder.id, depth + 1, max_depth, out).await?;
            }
        }
        for file in &files {
            out.push(TreeLine {
                depth,
                name: file.name.clone(),
                is_folder: false,
            });
        }
        Ok(())
    })
}

/// Copy a single remote file to a new parent under a possibly-new name.
/// Folders are explicitly unsupported.
pub async fn copy_file(
    ctx: &FsContext,
    file: &FileHandle,
    dest_parent_id: &str,
    dest_name: &str,
) -> Result<String, DriftboxError> {
    let tmp_dir = std::env::temp_dir();
    let tmp_path = tmp_dir.join(format!("driftbox-copy-{}", generate_uuid_v4()));

    crate::download::download_file(ctx, &file.id, &tmp_path, None, None).await?;

    let outcome = crate::upload::upload_file(
        ctx,
        crate::upload::UploadRequest {
            local_path: &tmp_path,
            parent_id: dest_parent_id,
            file_id: None,
            upload_key: None,
            file_key: None,
            resume_from_chunk: -1,
            on_start: None,
            progress: None,
        },
    )
    .await;

    let _ = tokio::fs::remove_file(&tmp_path).await;
    let outcome = outcome?;

    // The upload always lands under the temp file's basename on the remote;
    // always rename to the caller's requested name, even when it happens to
    // match the source file's name.
    let (folders, files) = ctx.list_children(dest_parent_id).await?;
    let _ = folders;
    if let Some(uploaded) = files.into_iter().find(|f| f.id == outcome.file_id) {
        rename_file(ctx, &uploaded, dest_name).await?;
    }

    Ok(outcome.file_id)
}

pub fn copy_folder_unsupported() -> DriftboxError {
    DriftboxError::FolderCopyUnsupported
}

/// Convenience: dispatch move/rename/trash by the kind resolved from a path.
pub enum AnyHandle {
    Folder(FolderHandle),
    File(FileHandle),
}

impl From<ResolvedKind> for AnyHandle {
    fn from(kind: ResolvedKind) -> Self {
        match kind {
            ResolvedKind::Folder(f) => AnyHandle::Folder(f),
            ResolvedKind::File(f) => AnyHandle::File(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_match_path_joins_cleanly() {
        let base = "/photos".trim_end_matches('/');
        assert_eq!(format!("{base}/a.jpg"), "/photos/a.jpg");
    }
}
