use serde::{Deserialize, Serialize};

/// Logged-in session state, loaded from and persisted to the credentials
/// file. `master_keys` is ordered oldest-first; the last entry is always the
/// key new data is encrypted under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub api_key: String,
    pub master_keys: Vec<String>,
    pub base_folder_id: String,
    pub user_id: u64,
}

/// A folder as resolved from a listing: identifier, parent, and plaintext
/// name (already decrypted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderHandle {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
}

/// A file as resolved from a listing: identifier, parent, plaintext name and
/// size, and everything needed to fetch and decrypt its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub size: u64,
    pub chunks: u32,
    pub mime: String,
    pub file_key: String,
    pub total_hash: String,
    pub last_modified_ms: i64,
    pub region: String,
    pub bucket: String,
}

/// Either side of a resolved path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolvedKind {
    Folder(FolderHandle),
    File(FileHandle),
}

/// Result of walking a POSIX path through the listing cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPath {
    pub kind: ResolvedKind,
    pub resolved_path: String,
}

/// How a transfer should treat an already-existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the destination untouched (default).
    Skip,
    /// Always replace the destination.
    Overwrite,
    /// Replace the destination only if the source is strictly newer.
    Newer,
    /// Ask the user, defaulting to No. Single-file commands only.
    Interactive,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Which direction a batch moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Upload,
    Download,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

/// Where one task in a batch currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Interrupted,
    Completed,
    Skipped { reason: String },
    Error { reason: String },
}

/// One file's worth of work inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTask {
    pub local_path: String,
    pub remote_path: String,
    pub status: TaskStatus,
    pub file_id: Option<String>,
    pub upload_key: Option<String>,
    /// The file's content-encryption key. Generated independently of
    /// `upload_key` and persisted here so a resumed upload can recover it
    /// without ever deriving it from a value that travels over the wire.
    pub file_key: Option<String>,
    /// -1 means no chunk has landed yet.
    pub last_successful_chunk: i64,
    pub remote_last_modified: Option<i64>,
}

impl BatchTask {
    pub fn new_pending(local_path: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            status: TaskStatus::Pending,
            file_id: None,
            upload_key: None,
            file_key: None,
            last_successful_chunk: -1,
            remote_last_modified: None,
        }
    }
}

/// The durable, on-disk record for one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    pub operation: OperationKind,
    pub target_remote_path: String,
    pub local_destination: Option<String>,
    pub tasks: Vec<BatchTask>,
}
