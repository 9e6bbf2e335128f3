//! Canonical serialization for deterministic hashing.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - Stable Vec order: vectors serialize in index order
//! - No HashMap in hashed data: maps are BTreeMap
//!
//! Two hash families are used:
//!
//! | use | function | algorithm |
//! |---|---|---|
//! | cache keys, fingerprints | [`canonical_hash`] | xxh64 |
//! | snapshot checksums | [`sha256_hex`] | SHA-256 |

use serde::Serialize;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute the canonical xxh64 hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    Ok(xxh64(&to_canonical_bytes(value)?, 0))
}

/// Compute the canonical xxh64 hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(format!("{:016x}", canonical_hash(value)?))
}

/// SHA-256 of raw bytes as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of a value's canonical JSON as lowercase hex.
pub fn canonical_sha256_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&to_canonical_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        tags: BTreeMap<String, u32>,
    }

    fn sample() -> Sample {
        let mut tags = BTreeMap::new();
        tags.insert("zinc".to_string(), 2);
        tags.insert("gaba".to_string(), 1);
        Sample {
            name: "sample".to_string(),
            tags,
        }
    }

    #[test]
    fn test_determinism() {
        assert_eq!(canonical_hash(&sample()).unwrap(), canonical_hash(&sample()).unwrap());
        assert_eq!(canonical_hash_hex(&sample()).unwrap().len(), 16);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(canonical_sha256_hex(&sample()).unwrap().len(), 64);
    }
}
