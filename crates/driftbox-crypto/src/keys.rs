//! Master key ring, per-file keys, and the random-identifier generators the
//! rest of the engine relies on.

use rand::RngCore;
use zeroize::Zeroize;

const RANDOM_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Draw `len` characters from the random-string alphabet shared by IVs, file
/// keys, and upload keys.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = (rng.next_u32() as usize) % RANDOM_ALPHABET.len();
            RANDOM_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a 16-byte random identifier patched to RFC 4122 v4 and formatted
/// as `8-4-4-4-12`.
pub fn generate_uuid_v4() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

/// One account master key. Held in memory only for the life of the process;
/// zeroized on drop.
#[derive(Clone)]
pub struct MasterKey(String);

impl MasterKey {
    pub fn new(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"[REDACTED]").finish()
    }
}

/// An ordered, non-empty list of master keys: oldest first, newest (the
/// encryption key) last. Decryption tries newest-first since that is the
/// overwhelmingly common case.
#[derive(Clone, Debug)]
pub struct MasterKeyRing {
    keys: Vec<MasterKey>,
}

impl MasterKeyRing {
    pub fn new(keys: Vec<MasterKey>) -> anyhow::Result<Self> {
        if keys.is_empty() {
            anyhow::bail!("master key ring must contain at least one key");
        }
        Ok(Self { keys })
    }

    /// The key that encrypts all new data.
    pub fn newest(&self) -> &MasterKey {
        self.keys.last().expect("ring is never empty")
    }

    /// Candidates to try for decryption, newest first.
    pub fn decrypt_candidates(&self) -> impl Iterator<Item = &MasterKey> {
        self.keys.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A per-file random key: 32 ASCII characters used directly as AES-256 key
/// bytes. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(raw: String) -> anyhow::Result<Self> {
        if raw.len() != 32 {
            anyhow::bail!("file key must be exactly 32 bytes, got {}", raw.len());
        }
        Ok(Self(raw))
    }

    pub fn generate() -> Self {
        Self(random_string(32))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FileKey").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        assert_eq!(random_string(12).len(), 12);
        assert_eq!(random_string(64).len(), 64);
    }

    #[test]
    fn random_strings_differ() {
        assert_ne!(random_string(32), random_string(32));
    }

    #[test]
    fn uuid_v4_has_version_and_variant_nibbles() {
        let id = generate_uuid_v4();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[2].chars().next().unwrap(), '4');
        let variant_nibble = parts[3].chars().next().unwrap();
        assert!(matches!(variant_nibble, '8' | '9' | 'a' | 'b'));
    }

    #[test]
    fn file_key_must_be_32_bytes() {
        assert!(FileKey::new("short".to_string()).is_err());
        assert!(FileKey::generate().as_bytes().len() == 32);
    }

    #[test]
    fn ring_decrypt_candidates_are_newest_first() {
        let ring = MasterKeyRing::new(vec![
            MasterKey::new("old".into()),
            MasterKey::new("mid".into()),
            MasterKey::new("new".into()),
        ])
        .unwrap();
        let order: Vec<&str> = ring.decrypt_candidates().map(|k| k.as_str()).collect();
        assert_eq!(order, vec!["new", "mid", "old"]);
        assert_eq!(ring.newest().as_str(), "new");
    }

    #[test]
    fn ring_rejects_empty_key_list() {
        assert!(MasterKeyRing::new(vec![]).is_err());
    }
}
