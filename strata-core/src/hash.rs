//! Stable content hashing for change detection and cache keys.
//!
//! The digest is a 128-bit non-cryptographic xxh3 hash. Stability across
//! process runs requires the hashed serialization itself to be
//! deterministic for semantically identical values.

use xxhash_rust::xxh3::xxh3_128;

/// Compute the stable 128-bit digest of a byte buffer.
pub fn stable_hash(bytes: &[u8]) -> u128 {
    xxh3_128(bytes)
}

/// Stable digest as a 32-character lowercase hex string.
pub fn stable_hash_hex(bytes: &[u8]) -> String {
    format!("{:032x}", stable_hash(bytes))
}
