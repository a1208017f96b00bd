//! Cache driver contract.
//!
//! One driver is active at a time; there is no fallback chain between
//! drivers (unlike the blob store). TTL is enforced lazily: every
//! read-path operation first checks whether the entry's stored expiry has
//! passed and, if so, deletes the entry before answering. No background
//! sweep runs.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strata_core::Result;

/// Backend contract for the ephemeral result cache.
#[async_trait]
pub trait CacheDriver: Debug + Send + Sync {
    /// Whether a live (unexpired) entry exists.
    async fn has(&self, key: &str) -> bool;

    /// Whether a live entry exists with the exact validator.
    async fn has_validated(&self, key: &str, validator: &str) -> bool;

    /// Read the live entry's payload.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Read the live entry's payload only if the validator matches.
    async fn get_validated(&self, key: &str, validator: &str) -> Option<Vec<u8>>;

    /// Store a payload, optionally expiring after `ttl`.
    async fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Store a validator-tagged payload, optionally expiring after `ttl`.
    async fn put_validated(
        &self,
        key: &str,
        validator: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Remove the entry. Idempotent.
    async fn del(&self, key: &str) -> Result<()>;
}

/// Current time in epoch millis.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Absolute expiry for an optional TTL, in epoch millis.
pub(crate) fn expiry_millis(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|d| now_millis() + d.as_millis() as i64)
}
