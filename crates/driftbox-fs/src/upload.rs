//! Chunked upload engine: encrypt-on-read, per-chunk hash, whole-file hash
//! continuation, and the empty/non-empty finalize calls.

use driftbox_core::error::DriftboxError;
use driftbox_crypto::{
    chunk_content_hash, chunk_count, encrypt_chunk, envelope_encrypt, envelope_encrypt as seal,
    generate_uuid_v4, random_string, FileKey, StreamingHasher, CHUNK_SIZE,
};
use serde::Serialize;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::context::FsContext;

/// Called once, before the first chunk of a fresh (non-resumed) upload
/// ships, with `(file_id, upload_key, file_key)` so the caller can persist
/// the resume state before any network I/O that could fail.
pub type OnUploadStart = Box<dyn Fn(&str, &str, &str) + Send + Sync>;
/// `(chunks_done, chunks_total, bytes_done, bytes_total)`.
pub type UploadProgress = Box<dyn Fn(u32, u32, u64, u64) + Send + Sync>;

pub struct UploadRequest<'a> {
    pub local_path: &'a Path,
    pub parent_id: &'a str,
    pub file_id: Option<String>,
    pub upload_key: Option<String>,
    /// The file's content-encryption key, if resuming a previously started
    /// upload. `None` on a fresh upload, in which case one is generated.
    pub file_key: Option<String>,
    pub resume_from_chunk: i64,
    pub on_start: Option<OnUploadStart>,
    pub progress: Option<UploadProgress>,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub file_id: String,
    pub total_hash_hex: String,
    pub size: u64,
}

#[derive(Serialize)]
struct EmptyUploadRequest<'a> {
    uuid: &'a str,
    name: String,
    #[serde(rename = "nameHashed")]
    name_hashed: String,
    size: u32,
    parent: &'a str,
    mime: String,
    metadata: String,
    version: u8,
}

#[derive(Serialize)]
struct FinalizeUploadRequest<'a> {
    uuid: &'a str,
    name: String,
    #[serde(rename = "nameHashed")]
    name_hashed: String,
    size: u64,
    chunks: u32,
    mime: String,
    rm: String,
    metadata: String,
    version: u8,
    #[serde(rename = "uploadKey")]
    upload_key: &'a str,
}

#[derive(Serialize)]
struct FileMetadataJson {
    name: String,
    size: u64,
    mime: String,
    key: String,
    hash: String,
    #[serde(rename = "lastModified")]
    last_modified: i64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn guess_mime(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Upload `req.local_path` into `req.parent_id`, resuming from
/// `req.resume_from_chunk + 1` when a prior attempt's resume triple is
/// supplied.
pub async fn upload_file(
    ctx: &FsContext,
    req: UploadRequest<'_>,
) -> Result<UploadOutcome, DriftboxError> {
    let metadata = tokio::fs::metadata(req.local_path)
        .await
        .map_err(DriftboxError::Io)?;
    let size = metadata.len();
    let name = req
        .local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DriftboxError::Other(anyhow::anyhow!("local path has no file name")))?
        .to_string();
    let mime = guess_mime(req.local_path);
    let name_hashed = ctx.name_hashed(&name);
    let master_key = ctx.master_keys.newest().as_str();

    if size == 0 {
        return upload_empty(ctx, req.parent_id, &name, &name_hashed, &mime, master_key).await;
    }

    let file_id = req.file_id.clone().unwrap_or_else(generate_uuid_v4);
    let upload_key = req.upload_key.clone().unwrap_or_else(|| random_string(32));
    let fresh = req.file_id.is_none();

    // The content key is generated independently of `upload_key`: the latter
    // travels to the server in cleartext (a chunk PUT query parameter and
    // the finalize body), so it can never double as the secret that
    // decrypts the file. On resume, reuse the key persisted by `on_start`.
    let file_key = match req.file_key.clone() {
        Some(raw) => FileKey::new(raw).map_err(|e| DriftboxError::Other(anyhow::anyhow!(e)))?,
        None => FileKey::generate(),
    };

    if fresh {
        if let Some(on_start) = &req.on_start {
            on_start(&file_id, &upload_key, file_key.as_str());
        }
    }

    let total_chunks = chunk_count(size);
    let mut file = tokio::fs::File::open(req.local_path)
        .await
        .map_err(DriftboxError::Io)?;

    let mut hasher = StreamingHasher::new();
    let resume_from = (req.resume_from_chunk + 1).max(0) as u32;

    if resume_from > 0 {
        file.seek(std::io::SeekFrom::Start(0))
            .await
            .map_err(DriftboxError::Io)?;
        let mut remaining = (resume_from as u64) * CHUNK_SIZE as u64;
        let mut buf = vec![0u8; CHUNK_SIZE];
        while remaining > 0 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            file.read_exact(&mut buf[..take])
                .await
                .map_err(DriftboxError::Io)?;
            hasher.update(&buf[..take]);
            remaining -= take as u64;
        }
    }

    for index in resume_from..total_chunks {
        let remaining_bytes = size - (index as u64) * CHUNK_SIZE as u64;
        let this_chunk_len = remaining_bytes.min(CHUNK_SIZE as u64) as usize;
        let mut buf = vec![0u8; this_chunk_len];
        if let Err(e) = file.read_exact(&mut buf).await {
            return Err(DriftboxError::ChunkUploadFailed {
                file_id,
                upload_key,
                last_successful_chunk: index as i64 - 1,
                cause: e.to_string(),
            });
        }
        hasher.update(&buf);

        let encrypted = encrypt_chunk(&file_key, &buf);
        let content_hash = chunk_content_hash(&encrypted);

        if let Err(e) = driftbox_transport::upload_chunk(
            &ctx.transport,
            &ctx.api_key,
            &file_id,
            index,
            req.parent_id,
            &upload_key,
            &content_hash,
            encrypted,
        )
        .await
        {
            return Err(DriftboxError::ChunkUploadFailed {
                file_id,
                upload_key,
                last_successful_chunk: index as i64 - 1,
                cause: e.to_string(),
            });
        }

        if let Some(progress) = &req.progress {
            progress(
                index + 1,
                total_chunks,
                ((index + 1) as u64 * CHUNK_SIZE as u64).min(size),
                size,
            );
        }
    }

    let total_hash_hex = hasher.finalize_hex();
    let metadata_json = FileMetadataJson {
        name: name.clone(),
        size,
        mime: mime.clone(),
        key: file_key.as_str().to_string(),
        hash: total_hash_hex.clone(),
        last_modified: now_ms(),
    };
    let metadata_envelope = seal(master_key, serde_json::to_vec(&metadata_json)
        .map_err(|e| DriftboxError::Other(e.into()))?
        .as_slice());

    let finalize = FinalizeUploadRequest {
        uuid: &file_id,
        name,
        name_hashed,
        size,
        chunks: total_chunks,
        mime,
        rm: random_string(32),
        metadata: metadata_envelope,
        version: 2,
        upload_key: &upload_key,
    };
    let _: serde_json::Value = ctx
        .transport
        .post_json("/v3/upload/done", Some(&ctx.api_key), &finalize)
        .await?;

    ctx.cache.invalidate(req.parent_id);

    Ok(UploadOutcome {
        file_id,
        total_hash_hex,
        size,
    })
}

async fn upload_empty(
    ctx: &FsContext,
    parent_id: &str,
    name: &str,
    name_hashed: &str,
    mime: &str,
    master_key: &str,
) -> Result<UploadOutcome, DriftboxError> {
    let file_id = generate_uuid_v4();
    let metadata_json = FileMetadataJson {
        name: name.to_string(),
        size: 0,
        mime: mime.to_string(),
        key: random_string(32),
        hash: String::new(),
        last_modified: now_ms(),
    };
    let metadata_envelope = envelope_encrypt(
        master_key,
        serde_json::to_vec(&metadata_json)
            .map_err(|e| DriftboxError::Other(e.into()))?
            .as_slice(),
    );

    let req = EmptyUploadRequest {
        uuid: &file_id,
        name: name.to_string(),
        name_hashed: name_hashed.to_string(),
        size: 0,
        parent: parent_id,
        mime: mime.to_string(),
        metadata: metadata_envelope,
        version: 2,
    };
    let _: serde_json::Value = ctx
        .transport
        .post_json("/v3/upload/empty", Some(&ctx.api_key), &req)
        .await?;

    ctx.cache.invalidate(parent_id);

    Ok(UploadOutcome {
        file_id,
        total_hash_hex: String::new(),
        size: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guess_falls_back_to_octet_stream() {
        assert_eq!(guess_mime(Path::new("photo.jpg")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("no_extension")), "application/octet-stream");
    }
}
