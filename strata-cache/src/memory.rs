//! In-memory cache driver.
//!
//! A single mutex guards the whole map so that every compound
//! check-then-act sequence (expiry check + delete, validator check +
//! read, put) is atomic. Never rely on a concurrent map's per-operation
//! atomicity for these sequences.

use crate::driver::{expiry_millis, now_millis, CacheDriver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use strata_core::Result;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct MemCacheEntry {
    value: Vec<u8>,
    validator: Option<String>,
    expires_at: Option<i64>,
}

impl MemCacheEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| now_millis() >= at)
    }
}

/// Mutex-guarded in-memory cache driver.
#[derive(Debug, Default)]
pub struct MemoryCacheDriver {
    entries: Mutex<HashMap<String, MemCacheEntry>>,
}

impl MemoryCacheDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheDriver for MemoryCacheDriver {
    async fn has(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    async fn has_validated(&self, key: &str, validator: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                false
            }
            Some(entry) => entry.validator.as_deref() == Some(validator),
            None => false,
        }
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    async fn get_validated(&self, key: &str, validator: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                None
            }
            Some(entry) if entry.validator.as_deref() == Some(validator) => {
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemCacheEntry {
                value: value.to_vec(),
                validator: None,
                expires_at: expiry_millis(ttl),
            },
        );
        Ok(())
    }

    async fn put_validated(
        &self,
        key: &str,
        validator: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemCacheEntry {
                value: value.to_vec(),
                validator: Some(validator.to_string()),
                expires_at: expiry_millis(ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_del() {
        let driver = MemoryCacheDriver::new();
        driver.put("k", b"v", None).await.unwrap();
        assert!(driver.has("k").await);
        assert_eq!(driver.get("k").await.unwrap(), b"v");

        driver.del("k").await.unwrap();
        assert!(!driver.has("k").await);
        driver.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_validator_gating() {
        let driver = MemoryCacheDriver::new();
        driver.put_validated("k", "v1", b"data", None).await.unwrap();

        assert!(driver.has_validated("k", "v1").await);
        assert!(!driver.has_validated("k", "v2").await);
        assert_eq!(driver.get_validated("k", "v1").await.unwrap(), b"data");
        assert!(driver.get_validated("k", "v2").await.is_none());

        // A plain entry has no validator to match.
        driver.put("plain", b"x", None).await.unwrap();
        assert!(!driver.has_validated("plain", "v1").await);
    }

    #[tokio::test]
    async fn test_lazy_ttl_expiry() {
        let driver = MemoryCacheDriver::new();
        driver
            .put("k", b"v", Some(Duration::from_millis(40)))
            .await
            .unwrap();
        assert!(driver.has("k").await);

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Expired entries are deleted on the read path.
        assert!(!driver.has("k").await);
        assert!(driver.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let driver = MemoryCacheDriver::new();
        driver.put("k", b"v", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(driver.has("k").await);
    }
}
