//! Raw chunk transport: authenticated upload, unauthenticated download.

use driftbox_core::error::DriftboxError;
use std::time::Duration;

use crate::client::TransportClient;

/// Upload one already-encrypted chunk. Enforces the hard 30-second per-chunk
/// timeout independently of the client's default timeout.
pub async fn upload_chunk(
    client: &TransportClient,
    api_key: &str,
    file_id: &str,
    index: u32,
    parent: &str,
    upload_key: &str,
    content_hash: &str,
    body: Vec<u8>,
) -> Result<(), DriftboxError> {
    let url = format!("{}/v3/upload", client.config().ingest_base);
    let timeout = Duration::from_secs(client.config().chunk_upload_timeout_secs);

    let resp = client
        .http()
        .post(&url)
        .bearer_auth(api_key)
        .query(&[
            ("uuid", file_id),
            ("index", &index.to_string()),
            ("parent", parent),
            ("uploadKey", upload_key),
            ("hash", content_hash),
        ])
        .timeout(timeout)
        .body(body)
        .send()
        .await
        .map_err(|e| DriftboxError::Network(format!("chunk {index} upload failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(DriftboxError::HttpStatus {
            status: resp.status().as_u16(),
            message: format!("chunk {index} upload rejected"),
        });
    }
    Ok(())
}

/// Download one chunk. Chunk downloads carry no bearer token — the object
/// path itself is the capability.
pub async fn download_chunk(
    client: &TransportClient,
    region: &str,
    bucket: &str,
    file_id: &str,
    index: u32,
) -> Result<Vec<u8>, DriftboxError> {
    let url = format!(
        "{}/{}/{}/{}/{}",
        client.config().egest_base,
        region,
        bucket,
        file_id,
        index
    );

    let resp = client
        .http()
        .get(&url)
        .send()
        .await
        .map_err(|e| DriftboxError::Network(format!("chunk {index} download failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(DriftboxError::HttpStatus {
            status: resp.status().as_u16(),
            message: format!("chunk {index} download rejected"),
        });
    }

    resp.bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| DriftboxError::Network(format!("reading chunk {index} body: {e}")))
}
