//! Per-chunk AES-256-GCM encryption and the streaming plaintext hash used to
//! verify a whole file once every chunk has landed.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha512};

use crate::kdf::hex_lower;
use crate::keys::{random_string, FileKey};

pub const CHUNK_SIZE: usize = 1_048_576;
const IV_LEN: usize = 12;

/// Encrypt one chunk under the file key with a fresh random IV, returning
/// `IV || ciphertext || tag`.
pub fn encrypt_chunk(file_key: &FileKey, plaintext: &[u8]) -> Vec<u8> {
    let iv = random_string(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(file_key.as_bytes()));
    let nonce = Nonce::from_slice(iv.as_bytes());
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &[],
            },
        )
        .expect("AES-256-GCM encryption with a valid 12-byte nonce cannot fail");

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(iv.as_bytes());
    out.extend_from_slice(&ciphertext);
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("encrypted chunk is shorter than the IV")]
    Truncated,
    #[error("chunk decryption failed: wrong file key or corrupted data")]
    DecryptFailed,
}

/// Decrypt one chunk previously produced by [`encrypt_chunk`].
pub fn decrypt_chunk(file_key: &FileKey, encrypted: &[u8]) -> Result<Vec<u8>, ChunkError> {
    if encrypted.len() < IV_LEN {
        return Err(ChunkError::Truncated);
    }
    let (iv, ciphertext) = encrypted.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(file_key.as_bytes()));
    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| ChunkError::DecryptFailed)
}

/// The content hash shipped alongside a chunk upload: SHA-512 of the
/// encrypted bytes (IV included), hex-encoded.
pub fn chunk_content_hash(encrypted: &[u8]) -> String {
    hex_lower(&Sha512::digest(encrypted))
}

/// Streaming SHA-512 over plaintext, used to compute (and resume computing)
/// the whole-file hash recorded in a file's metadata.
#[derive(Default)]
pub struct StreamingHasher(Sha512);

impl StreamingHasher {
    pub fn new() -> Self {
        Self(Sha512::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize_hex(self) -> String {
        hex_lower(&self.0.finalize())
    }
}

/// Number of 1 MiB chunks needed to store `size` bytes. Empty files have
/// zero chunks by convention.
pub fn chunk_count(size: u64) -> u32 {
    if size == 0 {
        0
    } else {
        ((size + CHUNK_SIZE as u64 - 1) / CHUNK_SIZE as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip() {
        let key = FileKey::generate();
        let plaintext = b"some file contents, chunked";
        let encrypted = encrypt_chunk(&key, plaintext);
        let decrypted = decrypt_chunk(&key, &encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails() {
        let key_a = FileKey::generate();
        let key_b = FileKey::generate();
        let encrypted = encrypt_chunk(&key_a, b"secret");
        assert!(matches!(
            decrypt_chunk(&key_b, &encrypted),
            Err(ChunkError::DecryptFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = FileKey::generate();
        let mut encrypted = encrypt_chunk(&key, b"secret data");
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert!(decrypt_chunk(&key, &encrypted).is_err());
    }

    #[test]
    fn chunk_counts_match_spec_boundaries() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(CHUNK_SIZE as u64), 1);
        assert_eq!(chunk_count(CHUNK_SIZE as u64 + 1), 2);
        assert_eq!(chunk_count(3 * CHUNK_SIZE as u64), 3);
    }

    #[test]
    fn streaming_hash_matches_oneshot() {
        let data = vec![7u8; 5000];
        let mut streaming = StreamingHasher::new();
        for piece in data.chunks(777) {
            streaming.update(piece);
        }
        let expect = hex_lower(&Sha512::digest(&data));
        assert_eq!(streaming.finalize_hex(), expect);
    }

    proptest! {
        #[test]
        fn chunk_roundtrip_arbitrary(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = FileKey::generate();
            let encrypted = encrypt_chunk(&key, &data);
            let decrypted = decrypt_chunk(&key, &encrypted).unwrap();
            prop_assert_eq!(decrypted, data);
        }
    }
}
