//! The "002" text envelope: `"002" || 12-char IV || base64(AES-256-GCM(...))`.
//!
//! The envelope key itself is derived from the caller-supplied key string via
//! a single PBKDF2-HMAC-SHA512 round keyed by itself. This looks redundant
//! but is a legacy construction the server has encrypted real data under, so
//! it has to be reproduced byte-for-byte rather than "fixed".

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha512;

use crate::keys::{random_string, MasterKeyRing};

const ENVELOPE_PREFIX: &str = "002";
const IV_LEN: usize = 12;

/// Derive the 32-byte AES key used to open/seal an envelope from the raw key
/// string (a master key, a file key, or any other printable secret).
fn derive_envelope_key(key: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::<Hmac<Sha512>>(key.as_bytes(), key.as_bytes(), 1, &mut out)
        .expect("32-byte output is valid for HMAC-SHA512");
    out
}

/// Encrypt `plaintext` into a "002" envelope under `key`.
pub fn encrypt(key: &str, plaintext: &[u8]) -> String {
    let ek = derive_envelope_key(key);
    let iv = random_string(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&ek));
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
    format!("{ENVELOPE_PREFIX}{iv}{}", BASE64.encode(ciphertext))
}

/// Encrypt a UTF-8 string into a "002" envelope.
pub fn encrypt_str(key: &str, plaintext: &str) -> String {
    encrypt(key, plaintext.as_bytes())
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope has an unrecognized prefix (expected \"002\")")]
    BadPrefix,
    #[error("envelope is too short to contain an IV")]
    Truncated,
    #[error("envelope body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decryption failed: wrong key or corrupted envelope")]
    DecryptFailed,
}

/// Decrypt a "002" envelope under a single key.
pub fn decrypt(key: &str, envelope: &str) -> Result<Vec<u8>, EnvelopeError> {
    if !envelope.starts_with(ENVELOPE_PREFIX) {
        return Err(EnvelopeError::BadPrefix);
    }
    let rest = &envelope[ENVELOPE_PREFIX.len()..];
    if rest.len() < IV_LEN {
        return Err(EnvelopeError::Truncated);
    }
    let (iv, body) = rest.split_at(IV_LEN);
    let ciphertext = BASE64.decode(body)?;

    let ek = derive_envelope_key(key);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&ek));
    let nonce = Nonce::from_slice(iv.as_bytes());
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| EnvelopeError::DecryptFailed)
}

pub fn decrypt_str(key: &str, envelope: &str) -> Result<String, EnvelopeError> {
    let bytes = decrypt(key, envelope)?;
    String::from_utf8(bytes).map_err(|_| EnvelopeError::DecryptFailed)
}

/// Decrypt an envelope trying every key in the ring, newest first. This is
/// how folder/file metadata envelopes (always sealed under the newest
/// master key) get opened even after a key rotation.
pub fn decrypt_with_ring(ring: &MasterKeyRing, envelope: &str) -> Result<Vec<u8>, EnvelopeError> {
    let mut last_err = EnvelopeError::DecryptFailed;
    for candidate in ring.decrypt_candidates() {
        match decrypt(candidate.as_str(), envelope) {
            Ok(plaintext) => return Ok(plaintext),
            Err(EnvelopeError::BadPrefix) | Err(EnvelopeError::Truncated) => {
                return decrypt(candidate.as_str(), envelope);
            }
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn roundtrip() {
        let sealed = encrypt("a-file-key-ish-string", b"hello world");
        let opened = decrypt("a-file-key-ish-string", &sealed).unwrap();
        assert_eq!(opened, b"hello world");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt("key-one", b"secret");
        assert!(matches!(
            decrypt("key-two", &sealed),
            Err(EnvelopeError::DecryptFailed)
        ));
    }

    #[test]
    fn rejects_bad_prefix() {
        assert!(matches!(
            decrypt("k", "003garbage"),
            Err(EnvelopeError::BadPrefix)
        ));
    }

    #[test]
    fn ring_tries_newest_first_then_falls_back() {
        let ring = MasterKeyRing::new(vec![
            crate::keys::MasterKey::new("old-key".into()),
            crate::keys::MasterKey::new("new-key".into()),
        ])
        .unwrap();
        let sealed_with_old = encrypt("old-key", b"legacy data");
        let opened = decrypt_with_ring(&ring, &sealed_with_old).unwrap();
        assert_eq!(opened, b"legacy data");
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_bytes(key in "\\PC{1,40}", data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let sealed = encrypt(&key, &data);
            let opened = decrypt(&key, &sealed).unwrap();
            prop_assert_eq!(opened, data);
        }
    }
}
