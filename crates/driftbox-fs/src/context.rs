//! Shared engine context: the transport client, identity, and listing cache
//! every fs operation is threaded through, plus the wire-record decoding
//! that turns ciphertext listings into [`FolderHandle`]/[`FileHandle`]s.

use driftbox_core::error::DriftboxError;
use driftbox_core::types::{FileHandle, FolderHandle};
use driftbox_crypto::{decrypt_with_ring, derive_name_hmac_key, name_hashed, MasterKeyRing};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::ListingCache;

/// Everything the fs-layer operations need that isn't per-call: the
/// authenticated transport, the decrypting identity, and the listing cache.
pub struct FsContext {
    pub transport: driftbox_transport::TransportClient,
    pub api_key: String,
    pub email: String,
    pub master_keys: MasterKeyRing,
    pub cache: ListingCache,
}

impl FsContext {
    pub fn new(
        transport: driftbox_transport::TransportClient,
        api_key: String,
        email: String,
        master_keys: MasterKeyRing,
        listing_ttl: Duration,
    ) -> Self {
        Self {
            transport,
            api_key,
            email,
            master_keys,
            cache: ListingCache::new(listing_ttl),
        }
    }

    pub fn name_hashed(&self, name: &str) -> String {
        let key = derive_name_hmac_key(self.master_keys.newest().as_str(), &self.email);
        name_hashed(&key, name)
    }

    /// List the folders and files directly under `parent_id`, serving from
    /// cache when possible.
    pub async fn list_children(
        &self,
        parent_id: &str,
    ) -> Result<(Vec<FolderHandle>, Vec<FileHandle>), DriftboxError> {
        if let (Some(folders), Some(files)) = (
            self.cache.get_folders(parent_id),
            self.cache.get_files(parent_id),
        ) {
            return Ok((folders, files));
        }

        let raw: DirContentResponse = self
            .transport
            .post_json(
                "/v3/dir/content",
                Some(&self.api_key),
                &DirContentRequest { uuid: parent_id },
            )
            .await?;

        let mut folders = Vec::with_capacity(raw.folders.len());
        for f in raw.folders {
            match decode_folder_name(&self.master_keys, &f.name) {
                Ok(name) => folders.push(FolderHandle {
                    id: f.uuid,
                    parent_id: Some(f.parent),
                    name,
                }),
                Err(e) => {
                    tracing::warn!(uuid = %f.uuid, error = %e, "undecryptable folder name");
                }
            }
        }

        let mut files = Vec::with_capacity(raw.uploads.len());
        for u in raw.uploads {
            match decode_file_metadata(&self.master_keys, &u.metadata) {
                Ok(meta) => files.push(FileHandle {
                    id: u.uuid,
                    parent_id: u.parent,
                    name: meta.name,
                    size: meta.size,
                    chunks: u.chunks,
                    mime: meta.mime,
                    file_key: meta.key,
                    total_hash: meta.hash,
                    last_modified_ms: meta.last_modified,
                    region: u.region,
                    bucket: u.bucket,
                }),
                Err(e) => {
                    tracing::warn!(uuid = %u.uuid, error = %e, "undecryptable file metadata");
                }
            }
        }

        self.cache.put_folders(parent_id, folders.clone());
        self.cache.put_files(parent_id, files.clone());
        Ok((folders, files))
    }
}

#[derive(Serialize)]
struct DirContentRequest<'a> {
    uuid: &'a str,
}

#[derive(Deserialize)]
struct DirContentResponse {
    #[serde(default)]
    folders: Vec<RawFolderRecord>,
    #[serde(default)]
    uploads: Vec<RawFileRecord>,
}

#[derive(Deserialize)]
struct RawFolderRecord {
    uuid: String,
    name: String,
    parent: String,
}

#[derive(Deserialize)]
struct RawFileRecord {
    uuid: String,
    metadata: String,
    parent: String,
    region: String,
    bucket: String,
    chunks: u32,
}

#[derive(Deserialize)]
struct FileMetadataJson {
    name: String,
    size: u64,
    mime: String,
    key: String,
    #[serde(default)]
    hash: String,
    #[serde(rename = "lastModified")]
    last_modified: i64,
}

/// Folder names are an envelope over either a raw UTF-8 string or a JSON
/// object `{name}` — accept both, discriminated on a leading `{`.
fn decode_folder_name(ring: &MasterKeyRing, envelope: &str) -> anyhow::Result<String> {
    let plaintext = decrypt_with_ring(ring, envelope)
        .map_err(|_| anyhow::anyhow!("could not decrypt folder name"))?;
    let text = String::from_utf8(plaintext)?;
    if text.trim_start().starts_with('{') {
        #[derive(Deserialize)]
        struct Wrapper {
            name: String,
        }
        let wrapper: Wrapper = serde_json::from_str(&text)?;
        Ok(wrapper.name)
    } else {
        Ok(text)
    }
}

fn decode_file_metadata(ring: &MasterKeyRing, envelope: &str) -> anyhow::Result<FileMetadataJson> {
    let plaintext = decrypt_with_ring(ring, envelope)
        .map_err(|_| anyhow::anyhow!("could not decrypt file metadata"))?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftbox_crypto::{envelope_encrypt, MasterKey};

    fn ring() -> MasterKeyRing {
        MasterKeyRing::new(vec![MasterKey::new("the-master-key".into())]).unwrap()
    }

    #[test]
    fn folder_name_accepts_raw_string() {
        let sealed = envelope_encrypt("the-master-key", b"Documents");
        assert_eq!(decode_folder_name(&ring(), &sealed).unwrap(), "Documents");
    }

    #[test]
    fn folder_name_accepts_json_object() {
        let sealed = envelope_encrypt("the-master-key", br#"{"name":"Photos"}"#);
        assert_eq!(decode_folder_name(&ring(), &sealed).unwrap(), "Photos");
    }

    #[test]
    fn file_metadata_decodes() {
        let json = serde_json::json!({
            "name": "report.pdf",
            "size": 12345,
            "mime": "application/pdf",
            "key": "k".repeat(32),
            "hash": "deadbeef",
            "lastModified": 1700000000000i64,
        })
        .to_string();
        let sealed = envelope_encrypt("the-master-key", json.as_bytes());
        let meta = decode_file_metadata(&ring(), &sealed).unwrap();
        assert_eq!(meta.name, "report.pdf");
        assert_eq!(meta.size, 12345);
    }
}
