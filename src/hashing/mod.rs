//! # Hash-Key Space
//!
//! Partition keys map onto a 128-bit hash-key space `[0, 2^128)`. Every OPEN shard
//! of a stream owns one contiguous range of that space; routing a record is a
//! lookup of the range containing `hash_partition_key(key)`.
//!
//! The hash is the first 16 bytes of SHA-256 read big-endian. It is stable across
//! processes and platforms, which replay and routing determinism depend on.

mod range;

use sha2::{Digest, Sha256};

pub use range::HashKeyRange;

/// A point in the hash-key space
pub type HashKey = u128;

/// Largest hash key; the space is `[0, MAX_HASH_KEY]` inclusive
pub const MAX_HASH_KEY: HashKey = u128::MAX;

/// Hash a partition key into the 128-bit key space
pub fn hash_partition_key(partition_key: &str) -> HashKey {
    let digest = Sha256::digest(partition_key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(bytes)
}

/// Parse a decimal hash key as it appears in requests and descriptions
pub fn parse_hash_key(s: &str) -> Option<HashKey> {
    s.trim().parse::<u128>().ok()
}

/// Serde adapter: `u128` hash keys travel as decimal strings because JSON
/// numbers cannot carry 128 bits.
pub mod hash_key_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::HashKey;

    pub fn serialize<S: Serializer>(key: &HashKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hash_key(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid hash key: {}", s)))
    }
}
