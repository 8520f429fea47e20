//! Durable, JSON-backed batch state: load, mutate in memory, flush
//! atomically (write to a temp file, then rename).

use driftbox_core::error::DriftboxError;
use driftbox_core::types::BatchState;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct BatchStateStore {
    path: PathBuf,
}

impl BatchStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<BatchState>, DriftboxError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(DriftboxError::Io)?;
        let state = serde_json::from_str(&content).map_err(|e| DriftboxError::Other(e.into()))?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &BatchState) -> Result<(), DriftboxError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(DriftboxError::Io)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| DriftboxError::Other(e.into()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &json).map_err(DriftboxError::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(DriftboxError::Io)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), DriftboxError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(DriftboxError::Io)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Throttle for persisting progress mid-batch: save when at least
/// `persist_every_chunks` new chunks have landed, or `persist_every_secs`
/// have elapsed, since the last save.
pub struct PersistThrottle {
    persist_every_chunks: u32,
    persist_every_secs: u64,
    last_saved_chunk: i64,
    last_saved_at: std::time::Instant,
}

impl PersistThrottle {
    pub fn new(persist_every_chunks: u32, persist_every_secs: u64) -> Self {
        Self {
            persist_every_chunks,
            persist_every_secs,
            last_saved_chunk: -1,
            last_saved_at: std::time::Instant::now(),
        }
    }

    pub fn should_save(&self, current_chunk: i64) -> bool {
        current_chunk - self.last_saved_chunk >= self.persist_every_chunks as i64
            || self.last_saved_at.elapsed().as_secs() >= self.persist_every_secs
    }

    pub fn mark_saved(&mut self, current_chunk: i64) {
        self.last_saved_chunk = current_chunk;
        self.last_saved_at = std::time::Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftbox_core::types::{BatchTask, OperationKind};

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStateStore::new(dir.path().join("missing.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStateStore::new(dir.path().join("batch_state_abc.json"));
        let state = BatchState {
            operation: OperationKind::Upload,
            target_remote_path: "/docs".into(),
            local_destination: None,
            tasks: vec![BatchTask::new_pending("a.txt", "/docs/a.txt")],
        };
        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.target_remote_path, "/docs");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStateStore::new(dir.path().join("s.json"));
        store
            .save(&BatchState {
                operation: OperationKind::Download,
                target_remote_path: "/x".into(),
                local_destination: Some("/tmp".into()),
                tasks: vec![],
            })
            .unwrap();
        assert!(store.path().exists());
        store.delete().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn persist_throttle_triggers_on_chunk_count() {
        let throttle = PersistThrottle::new(10, 3600);
        assert!(!throttle.should_save(5));
        assert!(throttle.should_save(10));
    }

    #[test]
    fn persist_throttle_triggers_on_elapsed_time() {
        let mut throttle = PersistThrottle::new(1000, 0);
        throttle.mark_saved(0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(throttle.should_save(1));
    }
}
