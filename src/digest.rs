//! SHA-256 checksums over canonical JSON.
//!
//! Values are routed through `serde_json::Value` first so object keys come
//! out sorted, which keeps the byte sequence stable across field reordering
//! in the source structs.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::MigrationPayload;

pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    serde_json::to_vec(&v)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Lowercase hex digest of a payload's canonical serialization.
pub fn payload_checksum(payload: &MigrationPayload) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&canonical_bytes(payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Student;

    fn one_student(email: &str) -> MigrationPayload {
        MigrationPayload {
            students: vec![Student {
                id: "1".to_string(),
                name: "Ada Lovelace".to_string(),
                email: email.to_string(),
                phone: None,
                grade: Some("10".to_string()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn identical_payloads_share_a_digest() {
        let a = payload_checksum(&one_student("a@b.com")).expect("digest");
        let b = payload_checksum(&one_student("a@b.com")).expect("digest");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn one_field_changes_the_digest() {
        let a = payload_checksum(&one_student("a@b.com")).expect("digest");
        let b = payload_checksum(&one_student("a@c.com")).expect("digest");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_input_hash_is_known() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
