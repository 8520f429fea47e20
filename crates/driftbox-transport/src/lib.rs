//! driftbox-transport: the authenticated JSON API client and raw chunk I/O.

pub mod chunk_io;
pub mod client;

pub use chunk_io::{download_chunk, upload_chunk};
pub use client::{ApiEnvelope, TransportClient};
