//! Download engine: fetch, decrypt, and stream a remote file to disk, with
//! optional byte-range support.

use driftbox_core::error::DriftboxError;
use driftbox_crypto::{decrypt_chunk, FileKey, CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::context::FsContext;
use crate::resolver;

/// `(chunks_done, chunks_total, bytes_done, bytes_total)`.
pub type DownloadProgress = Box<dyn Fn(u32, u32, u64, u64) + Send + Sync>;

pub struct DownloadOutcome {
    pub bytes_written: u64,
    pub filename: String,
    pub modification_time_ms: i64,
}

#[derive(Serialize)]
struct FileInfoRequest<'a> {
    uuid: &'a str,
}

#[derive(Deserialize)]
struct FileInfoResponse {
    metadata: String,
    parent: String,
    region: String,
    bucket: String,
    chunks: u32,
}

/// Download a file record looked up by a resolved path, writing the whole
/// plaintext to `dest`. A `range` restricts the write to `[start, end)`
/// plaintext bytes.
pub async fn download_file(
    ctx: &FsContext,
    file_id: &str,
    dest: &Path,
    range: Option<(u64, u64)>,
    progress: Option<DownloadProgress>,
) -> Result<DownloadOutcome, DriftboxError> {
    let info: FileInfoResponse = ctx
        .transport
        .post_json("/v3/file", Some(&ctx.api_key), &FileInfoRequest { uuid: file_id })
        .await?;

    let plaintext_meta = driftbox_crypto::decrypt_with_ring(&ctx.master_keys, &info.metadata)
        .map_err(|_| DriftboxError::DecryptFailed)?;

    #[derive(Deserialize)]
    struct FileMetadataJson {
        name: String,
        #[serde(default)]
        size: u64,
        key: String,
        #[serde(rename = "lastModified")]
        last_modified: i64,
    }
    let meta: FileMetadataJson =
        serde_json::from_slice(&plaintext_meta).map_err(|e| DriftboxError::Other(e.into()))?;

    let file_key =
        FileKey::new(meta.key.clone()).map_err(|e| DriftboxError::Other(anyhow::anyhow!(e)))?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DriftboxError::Io)?;
    }

    let tmp = dest.with_extension("driftbox_tmp");
    let mut out = tokio::fs::File::create(&tmp)
        .await
        .map_err(DriftboxError::Io)?;

    let (start_chunk, end_chunk) = match range {
        Some((start, end)) => (
            (start / CHUNK_SIZE as u64) as u32,
            (end / CHUNK_SIZE as u64) as u32,
        ),
        None => (0, info.chunks.saturating_sub(1)),
    };

    let mut bytes_written = 0u64;
    for index in start_chunk..=end_chunk.min(info.chunks.saturating_sub(1)) {
        if info.chunks == 0 {
            break;
        }
        let encrypted = driftbox_transport::download_chunk(
            &ctx.transport,
            &info.region,
            &info.bucket,
            file_id,
            index,
        )
        .await?;
        let mut plaintext = decrypt_chunk(&file_key, &encrypted)
            .map_err(|_| DriftboxError::DecryptFailed)?;

        if let Some((start, end)) = range {
            let chunk_start = index as u64 * CHUNK_SIZE as u64;
            let chunk_end = chunk_start + plaintext.len() as u64;
            let lo = start.max(chunk_start) - chunk_start;
            let hi = end.min(chunk_end) - chunk_start;
            plaintext = plaintext[lo as usize..hi as usize].to_vec();
        }

        out.write_all(&plaintext).await.map_err(DriftboxError::Io)?;
        bytes_written += plaintext.len() as u64;

        if let Some(cb) = &progress {
            cb(index + 1, info.chunks, bytes_written, meta.size);
        }
    }

    out.flush().await.map_err(DriftboxError::Io)?;
    drop(out);
    tokio::fs::rename(&tmp, dest).await.map_err(DriftboxError::Io)?;

    Ok(DownloadOutcome {
        bytes_written,
        filename: meta.name,
        modification_time_ms: meta.last_modified,
    })
}

/// Resolve `remote_path` and download it to `dest_dir` (or the file's own
/// name if `dest_dir` is a directory path).
pub async fn download_path(
    ctx: &FsContext,
    root_id: &str,
    remote_path: &str,
    dest: &Path,
    progress: Option<DownloadProgress>,
) -> Result<DownloadOutcome, DriftboxError> {
    use driftbox_core::types::ResolvedKind;

    let resolved = resolver::resolve_path(ctx, root_id, remote_path).await?;
    match resolved.kind {
        ResolvedKind::File(file) => {
            download_file(ctx, &file.id, dest, None, progress).await
        }
        ResolvedKind::Folder(_) => Err(DriftboxError::Other(anyhow::anyhow!(
            "{remote_path} is a folder, not a file"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_range_math_matches_chunk_boundaries() {
        let start = 1_500_000u64;
        let end = 2_500_000u64;
        let start_chunk = (start / CHUNK_SIZE as u64) as u32;
        let end_chunk = (end / CHUNK_SIZE as u64) as u32;
        assert_eq!(start_chunk, 1);
        assert_eq!(end_chunk, 2);
    }
}
