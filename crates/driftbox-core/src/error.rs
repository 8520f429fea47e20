use thiserror::Error;

pub type DriftboxResult<T> = Result<T, DriftboxError>;

/// Top-level error type shared across the engine crates.
///
/// Transport and filesystem crates wrap their leaf errors into this type at
/// the crate boundary; `anyhow::Error` carries anything that doesn't need a
/// distinguishable variant for callers to branch on.
#[derive(Debug, Error)]
pub enum DriftboxError {
    #[error("no credentials found, run `driftbox login` first")]
    AuthMissing,

    #[error("two-factor authentication required ({0})")]
    AuthChallenge(String),

    #[error("network error after retries: {0}")]
    Network(String),

    #[error("server returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("failed to decrypt: exhausted all master keys")]
    DecryptFailed,

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error(
        "chunk upload interrupted at chunk {last_successful_chunk} for file {file_id}: {cause}"
    )]
    ChunkUploadFailed {
        file_id: String,
        upload_key: String,
        last_successful_chunk: i64,
        cause: String,
    },

    #[error("skipped due to conflict: {0}")]
    ConflictSkipped(String),

    #[error("local hash does not match remote record")]
    IntegrityMismatch,

    #[error("copy of folders is not supported")]
    FolderCopyUnsupported,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
