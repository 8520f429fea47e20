//! Deterministic batch identifiers: re-running the same command resumes the
//! same batch instead of starting a fresh one.

use driftbox_core::types::OperationKind;
use sha1::{Digest, Sha1};

/// First 16 hex characters of `SHA-1(operation || "-" || sources.join("|") || "-" || target)`.
pub fn batch_id(operation: OperationKind, sources: &[String], target: &str) -> String {
    let joined_sources = sources.join("|");
    let input = format!("{}-{}-{}", operation.as_str(), joined_sources, target);
    let digest = Sha1::digest(input.as_bytes());
    let mut hex = String::with_capacity(40);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = batch_id(OperationKind::Upload, &["/local/a".into()], "/remote");
        let b = batch_id(OperationKind::Upload, &["/local/a".into()], "/remote");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn differs_on_target() {
        let a = batch_id(OperationKind::Upload, &["/local/a".into()], "/remote-1");
        let b = batch_id(OperationKind::Upload, &["/local/a".into()], "/remote-2");
        assert_ne!(a, b);
    }

    #[test]
    fn differs_on_operation_kind() {
        let a = batch_id(OperationKind::Upload, &["/x".into()], "/remote");
        let b = batch_id(OperationKind::Download, &["/x".into()], "/remote");
        assert_ne!(a, b);
    }
}
