//! Deterministic filename hashing: lets the server index files by name
//! without ever learning the plaintext name.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2;
use sha2::Sha512;

use crate::kdf::hex_lower;

type HmacSha256 = Hmac<sha2::Sha256>;

/// Derive the per-identity key used to hash filenames, from the newest
/// master key and the account email.
pub fn derive_name_hmac_key(newest_master_key: &str, email: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::<Hmac<Sha512>>(
        newest_master_key.as_bytes(),
        email.to_lowercase().as_bytes(),
        1,
        &mut out,
    )
    .expect("32-byte output is valid for HMAC-SHA512");
    out
}

/// Hash a filename for server-side lookup. Case-insensitive: the server
/// (and every client) lowercases the name before hashing.
pub fn name_hashed(hmac_key: &[u8; 32], name: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(hmac_key).expect("HMAC-SHA256 accepts any key length");
    mac.update(name.to_lowercase().as_bytes());
    hex_lower(&mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let key = derive_name_hmac_key("master-key-hex", "user@example.com");
        assert_eq!(
            name_hashed(&key, "Report.PDF"),
            name_hashed(&key, "report.pdf")
        );
    }

    #[test]
    fn hash_depends_on_identity() {
        let key_a = derive_name_hmac_key("master-key-a", "user@example.com");
        let key_b = derive_name_hmac_key("master-key-b", "user@example.com");
        assert_ne!(name_hashed(&key_a, "x"), name_hashed(&key_b, "x"));
    }

    #[test]
    fn different_names_hash_differently() {
        let key = derive_name_hmac_key("master-key-hex", "user@example.com");
        assert_ne!(name_hashed(&key, "a.txt"), name_hashed(&key, "b.txt"));
    }

    #[test]
    fn email_case_does_not_matter() {
        let key_lower = derive_name_hmac_key("master-key-hex", "user@example.com");
        let key_mixed = derive_name_hmac_key("master-key-hex", "User@Example.COM");
        assert_eq!(
            name_hashed(&key_lower, "x.txt"),
            name_hashed(&key_mixed, "x.txt")
        );
    }
}
