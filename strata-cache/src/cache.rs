//! Result cache façade.
//!
//! [`ResultCache`] wraps the single active driver, selected at startup by
//! a preferred type with a documented in-memory fallback when the
//! preferred driver cannot initialize. Keys reaching the driver are
//! colon-joined from the caller's segments; typed values serialize
//! through JSON.

use crate::driver::CacheDriver;
use crate::memory::MemoryCacheDriver;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_core::Result;
use tracing::{debug, warn};

/// Ephemeral key/value cache over one active driver.
#[derive(Debug, Clone)]
pub struct ResultCache {
    driver: Arc<dyn CacheDriver>,
}

impl ResultCache {
    /// Select the preferred driver, falling back to in-memory.
    pub fn open(preferred: &str, mut drivers: HashMap<String, Arc<dyn CacheDriver>>) -> Self {
        let driver = match drivers.remove(preferred) {
            Some(driver) => {
                debug!(preferred, "result cache driver selected");
                driver
            }
            None => {
                warn!(
                    preferred,
                    "preferred cache driver unavailable, falling back to memory"
                );
                Arc::new(MemoryCacheDriver::new()) as Arc<dyn CacheDriver>
            }
        };
        Self { driver }
    }

    /// Wrap an already-constructed driver.
    pub fn with_driver(driver: Arc<dyn CacheDriver>) -> Self {
        Self { driver }
    }

    /// Colon-join variadic key segments into the driver key.
    pub fn join_key(segments: &[&str]) -> String {
        segments.join(":")
    }

    /// Whether a live entry exists.
    pub async fn has(&self, segments: &[&str]) -> bool {
        self.driver.has(&Self::join_key(segments)).await
    }

    /// Whether a live entry exists with the exact validator.
    pub async fn has_validated(&self, segments: &[&str], validator: &str) -> bool {
        self.driver
            .has_validated(&Self::join_key(segments), validator)
            .await
    }

    /// Read and deserialize the live entry.
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Option<T> {
        let bytes = self.driver.get(&Self::join_key(segments)).await?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Read and deserialize the live entry if the validator matches.
    pub async fn get_validated<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        validator: &str,
    ) -> Option<T> {
        let bytes = self
            .driver
            .get_validated(&Self::join_key(segments), validator)
            .await?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Serialize and store a value, optionally expiring after `ttl`.
    pub async fn put<T: Serialize>(
        &self,
        segments: &[&str],
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.driver.put(&Self::join_key(segments), &bytes, ttl).await
    }

    /// Serialize and store a validator-tagged value.
    pub async fn put_validated<T: Serialize>(
        &self,
        segments: &[&str],
        validator: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.driver
            .put_validated(&Self::join_key(segments), validator, &bytes, ttl)
            .await
    }

    /// Remove the entry.
    pub async fn del(&self, segments: &[&str]) -> Result<()> {
        self.driver.del(&Self::join_key(segments)).await
    }
}
