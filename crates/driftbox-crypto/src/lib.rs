//! driftbox-crypto: client-side end-to-end encryption.
//!
//! Key hierarchy:
//! ```text
//! Password --PBKDF2-HMAC-SHA512(200_000)--> local master key (ring, newest-last)
//!   ├── "002" envelope (AES-256-GCM, PBKDF2(1)-derived envelope key)
//! >     wraps folder/file metadata, encrypted under the newest master key
//!   ├── per-file key (32 random ASCII bytes)
//! >     wraps file chunks (AES-256-GCM) and per-field metadata envelopes
//!   └── name-hash key (PBKDF2(1) over master key + email)
//! >     HMAC-SHA256 of the lowercased name, for server-side lookup
//! ```

pub mod chunk;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod names;

pub use chunk::{chunk_content_hash, chunk_count, decrypt_chunk, encrypt_chunk, StreamingHasher, CHUNK_SIZE};
pub use envelope::{decrypt as envelope_decrypt, decrypt_with_ring, encrypt as envelope_encrypt, EnvelopeError};
pub use kdf::{derive_auth, AuthVersion, DerivedAuth};
pub use keys::{generate_uuid_v4, random_string, FileKey, MasterKey, MasterKeyRing};
pub use names::{derive_name_hmac_key, name_hashed};
