//! Password key derivation: PBKDF2-HMAC-SHA512 passphrase -> login password + local master key.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};

/// Number of PBKDF2 rounds used for the password-derived key. Matches the
/// server's documented KDF parameters; changing it would break login for
/// every existing account.
pub const PBKDF2_ITERATIONS: u32 = 200_000;
const PBKDF2_DK_LEN: usize = 64;

/// Which login-password derivation the account was created under.
///
/// V1 accounts predate the split between the value sent to the server and
/// the value used to encrypt data locally; V2 accounts separate the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVersion {
    V1,
    V2,
}

impl AuthVersion {
    pub fn from_u32(v: u32) -> anyhow::Result<Self> {
        match v {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => anyhow::bail!("unknown auth version: {other}"),
        }
    }
}

/// Output of password key derivation: what gets sent to the server, and what
/// stays local to decrypt the master-key envelope.
#[derive(Debug, Clone)]
pub struct DerivedAuth {
    pub login_password: String,
    pub local_master_key: String,
}

fn pbkdf2_hex(password: &[u8], salt: &[u8], iterations: u32, dk_len: usize) -> String {
    let mut out = vec![0u8; dk_len];
    pbkdf2::<Hmac<Sha512>>(password, salt, iterations, &mut out)
        .expect("pbkdf2 output length is valid for HMAC-SHA512");
    hex_lower(&out)
}

/// Derive the login password and local master key from a user's passphrase
/// and the per-account salt returned by `auth/info`.
pub fn derive_auth(password: &SecretString, salt: &str, version: AuthVersion) -> DerivedAuth {
    let dk_hex = pbkdf2_hex(
        password.expose_secret().as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        PBKDF2_DK_LEN,
    );

    match version {
        AuthVersion::V1 => DerivedAuth {
            login_password: dk_hex.clone(),
            local_master_key: dk_hex,
        },
        AuthVersion::V2 => {
            let (local_master_key, second_half) = dk_hex.split_at(64);
            let login_password = hex_lower(&Sha512::digest(second_half.as_bytes()));
            DerivedAuth {
                login_password,
                local_master_key: local_master_key.to_string(),
            }
        }
    }
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_reuses_the_full_digest() {
        let password = SecretString::from("correct horse battery staple");
        let derived = derive_auth(&password, "somesalt", AuthVersion::V1);
        assert_eq!(derived.local_master_key, derived.login_password);
        assert_eq!(derived.local_master_key.len(), 128);
    }

    #[test]
    fn v2_splits_into_distinct_halves() {
        let password = SecretString::from("correct horse battery staple");
        let derived = derive_auth(&password, "somesalt", AuthVersion::V2);
        assert_eq!(derived.local_master_key.len(), 64);
        assert_eq!(derived.login_password.len(), 128);
        assert_ne!(derived.local_master_key, derived.login_password);
    }

    #[test]
    fn derivation_is_deterministic() {
        let password = SecretString::from("hunter2");
        let a = derive_auth(&password, "salt", AuthVersion::V2);
        let b = derive_auth(&password, "salt", AuthVersion::V2);
        assert_eq!(a.local_master_key, b.local_master_key);
        assert_eq!(a.login_password, b.login_password);
    }

    #[test]
    fn different_salts_diverge() {
        let password = SecretString::from("hunter2");
        let a = derive_auth(&password, "salt-a", AuthVersion::V2);
        let b = derive_auth(&password, "salt-b", AuthVersion::V2);
        assert_ne!(a.local_master_key, b.local_master_key);
    }
}
