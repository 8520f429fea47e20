pub mod builder;
pub mod conflict;
pub mod controller;
pub mod id;
pub mod state;

pub use builder::{build_download_tasks, build_upload_tasks, TaskFilter};
pub use conflict::{evaluate, ConflictDecision};
pub use controller::{run_batch, BatchSummary, InteractivePrompt, RunOptions};
pub use id::batch_id;
pub use state::{BatchStateStore, PersistThrottle};
