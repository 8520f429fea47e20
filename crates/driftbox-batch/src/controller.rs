//! Drives a batch to completion: per-task conflict check, engine dispatch,
//! durable progress persistence, and resume on re-invocation.

use driftbox_core::error::DriftboxError;
use driftbox_core::types::{BatchState, BatchTask, ConflictPolicy, OperationKind, TaskStatus};
use driftbox_fs::FsContext;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::conflict::{evaluate, ConflictDecision};
use crate::state::{BatchStateStore, PersistThrottle};

/// Locks `shared`, serializes it, and writes it via `store`, logging (not
/// propagating) a failure — a missed checkpoint should never abort the
/// transfer that's actually making progress.
fn checkpoint(store: &BatchStateStore, shared: &Mutex<BatchState>) {
    let state = shared.lock().unwrap();
    if let Err(e) = store.save(&state) {
        tracing::warn!(error = %e, "failed to persist batch checkpoint");
    }
}

/// Summary counters reported once a batch finishes (or is interrupted).
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    pub completed: u32,
    pub skipped: u32,
    pub errored: u32,
}

impl BatchSummary {
    pub fn exit_code(&self) -> i32 {
        if self.errored > 0 {
            1
        } else {
            0
        }
    }
}

/// Asks the user to confirm an interactive-mode conflict. Returns `true` to
/// proceed. Only consulted for single-task batches, per the conflict
/// policy's contract.
pub type InteractivePrompt = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct RunOptions {
    pub policy: ConflictPolicy,
    pub force: bool,
    pub persist_every_chunks: u32,
    pub persist_every_secs: u64,
    pub interactive_prompt: Option<InteractivePrompt>,
}

/// Run every not-yet-terminal task in `state`, persisting progress via
/// `store` as it goes, and return a summary. On return the caller should
/// delete `store`'s file iff `summary.errored == 0`.
pub async fn run_batch(
    ctx: &FsContext,
    root_id: &str,
    store: &BatchStateStore,
    state: &mut BatchState,
    options: RunOptions,
) -> Result<BatchSummary, DriftboxError> {
    let mut summary = BatchSummary::default();
    let shared = Arc::new(Mutex::new(state.clone()));
    let task_count = shared.lock().unwrap().tasks.len();

    for i in 0..task_count {
        let status = shared.lock().unwrap().tasks[i].status.clone();
        match status {
            TaskStatus::Completed => {
                summary.completed += 1;
                continue;
            }
            TaskStatus::Skipped { .. } => {
                summary.skipped += 1;
                continue;
            }
            _ => {}
        }

        run_one_task(ctx, root_id, &shared, store, i, &options).await;
        checkpoint(store, &shared);

        let status = shared.lock().unwrap().tasks[i].status.clone();
        match status {
            TaskStatus::Completed => summary.completed += 1,
            TaskStatus::Skipped { .. } => summary.skipped += 1,
            TaskStatus::Error { .. } => summary.errored += 1,
            _ => {}
        }
    }

    *state = shared.lock().unwrap().clone();

    if summary.errored == 0 {
        store.delete()?;
    }

    Ok(summary)
}

async fn run_one_task(
    ctx: &FsContext,
    root_id: &str,
    shared: &Arc<Mutex<BatchState>>,
    store: &BatchStateStore,
    index: usize,
    options: &RunOptions,
) {
    let operation = shared.lock().unwrap().operation;
    match operation {
        OperationKind::Upload => run_upload_task(ctx, root_id, shared, store, index, options).await,
        OperationKind::Download => run_download_task(ctx, shared, index, options).await,
    }
}

async fn run_upload_task(
    ctx: &FsContext,
    root_id: &str,
    shared: &Arc<Mutex<BatchState>>,
    store: &BatchStateStore,
    index: usize,
    options: &RunOptions,
) {
    let (local_path, remote_path) = {
        let state = shared.lock().unwrap();
        let task = &state.tasks[index];
        (task.local_path.clone(), task.remote_path.clone())
    };

    let parent_dir = match Path::new(&remote_path).parent().and_then(|p| p.to_str()) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => "/".to_string(),
    };
    let file_name = Path::new(&remote_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    let parent_id = match driftbox_fs::ops::mkdir_recursive(ctx, root_id, &parent_dir, None, None).await {
        Ok(id) => id,
        Err(e) => {
            shared.lock().unwrap().tasks[index].status = TaskStatus::Error {
                reason: format!("resolving parent: {e}"),
            };
            return;
        }
    };

    if !options.force {
        let existing = ctx.list_children(&parent_id).await.ok().and_then(|(_, files)| {
            files.into_iter().find(|f| f.name == file_name)
        });
        if let Some(existing_file) = existing {
            let local_mtime = std::fs::metadata(&local_path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);

            let decision = evaluate(options.policy, local_mtime, Some(existing_file.last_modified_ms));
            let proceed = match decision {
                ConflictDecision::Proceed => true,
                ConflictDecision::Skip { reason } => {
                    shared.lock().unwrap().tasks[index].status = TaskStatus::Skipped { reason };
                    false
                }
                ConflictDecision::AskUser => options
                    .interactive_prompt
                    .as_ref()
                    .map(|p| p(&remote_path))
                    .unwrap_or(false),
            };
            if !proceed {
                let mut state = shared.lock().unwrap();
                if !matches!(state.tasks[index].status, TaskStatus::Skipped { .. }) {
                    state.tasks[index].status = TaskStatus::Skipped {
                        reason: "declined".into(),
                    };
                }
                return;
            }
        }
    }

    let (resume_from_chunk, file_id, upload_key, file_key) = {
        let mut state = shared.lock().unwrap();
        state.tasks[index].status = TaskStatus::Uploading;
        let task = &state.tasks[index];
        (
            task.last_successful_chunk,
            task.file_id.clone(),
            task.upload_key.clone(),
            task.file_key.clone(),
        )
    };
    let remote_path_for_log = remote_path.clone();
    let throttle = Mutex::new(PersistThrottle::new(
        options.persist_every_chunks,
        options.persist_every_secs,
    ));

    let on_start: driftbox_fs::OnUploadStart = {
        let shared = Arc::clone(shared);
        let store = store.clone();
        Box::new(move |file_id, upload_key, file_key| {
            {
                let mut state = shared.lock().unwrap();
                state.tasks[index].file_id = Some(file_id.to_string());
                state.tasks[index].upload_key = Some(upload_key.to_string());
                state.tasks[index].file_key = Some(file_key.to_string());
            }
            checkpoint(&store, &shared);
        })
    };

    let progress: driftbox_fs::UploadProgress = {
        let shared = Arc::clone(shared);
        let store = store.clone();
        Box::new(move |chunk_done, total, bytes_done, bytes_total| {
            tracing::trace!(
                remote_path = %remote_path_for_log,
                chunk_done,
                total,
                bytes_done,
                bytes_total,
                "upload progress"
            );
            let current_chunk = chunk_done as i64 - 1;
            let mut gate = throttle.lock().unwrap();
            if gate.should_save(current_chunk) {
                {
                    let mut state = shared.lock().unwrap();
                    state.tasks[index].last_successful_chunk = current_chunk;
                }
                checkpoint(&store, &shared);
                gate.mark_saved(current_chunk);
            }
        })
    };

    let result = driftbox_fs::upload_file(
        ctx,
        driftbox_fs::UploadRequest {
            local_path: Path::new(&local_path),
            parent_id: &parent_id,
            file_id,
            upload_key,
            file_key,
            resume_from_chunk,
            on_start: Some(on_start),
            progress: Some(progress),
        },
    )
    .await;

    let mut state = shared.lock().unwrap();
    match result {
        Ok(_) => {
            state.tasks[index].status = TaskStatus::Completed;
            state.tasks[index].file_id = None;
            state.tasks[index].upload_key = None;
            state.tasks[index].file_key = None;
            state.tasks[index].last_successful_chunk = -1;
        }
        Err(DriftboxError::ChunkUploadFailed {
            file_id,
            upload_key,
            last_successful_chunk,
            cause,
        }) => {
            state.tasks[index].file_id = Some(file_id);
            state.tasks[index].upload_key = Some(upload_key);
            state.tasks[index].last_successful_chunk = last_successful_chunk;
            state.tasks[index].status = TaskStatus::Interrupted;
            tracing::warn!(remote_path, cause, "upload interrupted, will resume");
        }
        Err(e) => {
            state.tasks[index].status = TaskStatus::Error {
                reason: e.to_string(),
            };
        }
    }
}

async fn run_download_task(
    ctx: &FsContext,
    shared: &Arc<Mutex<BatchState>>,
    index: usize,
    options: &RunOptions,
) {
    let task: BatchTask = shared.lock().unwrap().tasks[index].clone();
    let dest_path = task.local_path.clone();
    let file_id = task.remote_path.clone(); // remote_uuid is stashed in remote_path for downloads

    if !options.force && Path::new(&dest_path).exists() {
        let local_mtime = std::fs::metadata(&dest_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);

        let decision = evaluate(options.policy, task.remote_last_modified, local_mtime);
        let proceed = match decision {
            ConflictDecision::Proceed => true,
            ConflictDecision::Skip { reason } => {
                shared.lock().unwrap().tasks[index].status = TaskStatus::Skipped { reason };
                false
            }
            ConflictDecision::AskUser => options
                .interactive_prompt
                .as_ref()
                .map(|p| p(&dest_path))
                .unwrap_or(false),
        };
        if !proceed {
            let mut state = shared.lock().unwrap();
            if !matches!(state.tasks[index].status, TaskStatus::Skipped { .. }) {
                state.tasks[index].status = TaskStatus::Skipped {
                    reason: "declined".into(),
                };
            }
            return;
        }
    }

    let result = driftbox_fs::download_file(ctx, &file_id, Path::new(&dest_path), None, None).await;
    let mut state = shared.lock().unwrap();
    match result {
        Ok(_) => {
            state.tasks[index].status = TaskStatus::Completed;
        }
        Err(e) => {
            state.tasks[index].status = TaskStatus::Error {
                reason: e.to_string(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_exit_code_reflects_errors() {
        let mut summary = BatchSummary::default();
        assert_eq!(summary.exit_code(), 0);
        summary.errored = 1;
        assert_eq!(summary.exit_code(), 1);
    }
}
