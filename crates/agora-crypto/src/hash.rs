//! SHA3-256 hashing over bytes and structured values.

use serde::Serialize;
use serde_json::Value;
use sha3::{Digest, Sha3_256};

use crate::canonical::to_canonical_json;
use crate::error::CryptoError;

/// SHA3-256 over raw bytes, as lowercase hex.
pub fn sha3_hex(data: &[u8]) -> String {
    hex::encode(Sha3_256::digest(data))
}

/// Hash a JSON value.
///
/// String scalars hash their raw contents (not the quoted JSON form), so a
/// commitment computed over `choice ‖ nonce` matches a commitment computed
/// by any peer that concatenates the same text. Every other shape hashes
/// its canonical JSON rendering.
pub fn hash_value(value: &Value) -> String {
    match value {
        Value::String(s) => sha3_hex(s.as_bytes()),
        other => sha3_hex(to_canonical_json(other).as_bytes()),
    }
}

/// Serialize a value and hash it as [`hash_value`] does.
pub fn hash_of<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let json = serde_json::to_value(value)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(hash_value(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_64_hex_chars() {
        let digest = sha3_hex(b"agora");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_string_hashes_raw_contents() {
        assert_eq!(hash_value(&json!("abc")), sha3_hex(b"abc"));
    }

    #[test]
    fn test_object_hash_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_empty_input() {
        // SHA3-256 of the empty string, the root of an empty Merkle tree.
        assert_eq!(
            sha3_hex(b""),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }
}
