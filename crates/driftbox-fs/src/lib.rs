//! driftbox-fs: path resolution, the listing cache, and the upload/download
//! engines and path mutation operations built on top of them.

pub mod cache;
pub mod context;
pub mod download;
pub mod ops;
pub mod resolver;
pub mod upload;

pub use cache::ListingCache;
pub use context::FsContext;
pub use download::{download_file, download_path, DownloadOutcome, DownloadProgress};
pub use resolver::resolve_path;
pub use upload::{upload_file, OnUploadStart, UploadOutcome, UploadProgress, UploadRequest};
