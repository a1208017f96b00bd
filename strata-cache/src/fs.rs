//! Filesystem cache driver.
//!
//! On-disk layout, one directory per key:
//!
//! ```text
//! cache_root/
//!   <128-bit hash of key, hex>/
//!     content        payload (when stored without an explicit validator)
//!     <validator>    payload named by the validator string
//!     ttl            expiry as epoch-millis decimal text (absent = never)
//! ```
//!
//! Mutations are serialized behind a driver-level lock to avoid
//! interleaved partial writes; expiry is enforced lazily on reads.

use crate::driver::{expiry_millis, now_millis, CacheDriver};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_core::{stable_hash_hex, Error, Result};
use tokio::sync::Mutex;
use tracing::debug;

const CONTENT_FILE: &str = "content";
const TTL_FILE: &str = "ttl";

/// Disk-backed cache driver.
#[derive(Debug)]
pub struct FileCacheDriver {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCacheDriver {
    /// Create a driver rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &str) -> PathBuf {
        self.root.join(stable_hash_hex(key.as_bytes()))
    }

    /// Remove the entry if its ttl has passed; returns the live dir.
    async fn live_dir(&self, key: &str) -> Option<PathBuf> {
        let dir = self.key_dir(key);
        if !dir.is_dir() {
            return None;
        }

        let ttl_path = dir.join(TTL_FILE);
        match tokio::fs::read_to_string(&ttl_path).await {
            Ok(text) => {
                let expires_at: i64 = text.trim().parse().unwrap_or(0);
                if now_millis() >= expires_at {
                    debug!(key, "evicting expired cache entry");
                    let _guard = self.write_lock.lock().await;
                    let _ = tokio::fs::remove_dir_all(&dir).await;
                    return None;
                }
                Some(dir)
            }
            // Absent ttl file means "never expires".
            Err(_) => Some(dir),
        }
    }

    async fn payload_file(&self, key: &str, validator: Option<&str>) -> Option<PathBuf> {
        let dir = self.live_dir(key).await?;
        match validator {
            Some(v) => {
                let file = dir.join(sanitize_validator(v));
                file.is_file().then_some(file)
            }
            None => {
                let content = dir.join(CONTENT_FILE);
                if content.is_file() {
                    return Some(content);
                }
                // Validator-tagged payload: a single file besides ttl.
                let mut entries = tokio::fs::read_dir(&dir).await.ok()?;
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name();
                    if name != TTL_FILE {
                        return Some(entry.path());
                    }
                }
                None
            }
        }
    }

    async fn write_entry(
        &self,
        key: &str,
        file_name: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.key_dir(key);

        // A fresh write replaces the whole entry.
        let _ = tokio::fs::remove_dir_all(&dir).await;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::io(format!(
                "Failed to create cache entry {}: {}",
                dir.display(),
                e
            ))
        })?;

        let payload = dir.join(file_name);
        tokio::fs::write(&payload, value)
            .await
            .map_err(|e| Error::io(format!("Failed to write {}: {}", payload.display(), e)))?;

        if let Some(expires_at) = expiry_millis(ttl) {
            let ttl_path = dir.join(TTL_FILE);
            tokio::fs::write(&ttl_path, expires_at.to_string())
                .await
                .map_err(|e| Error::io(format!("Failed to write {}: {}", ttl_path.display(), e)))?;
        }
        Ok(())
    }
}

fn sanitize_validator(validator: &str) -> String {
    let trimmed = validator.trim_matches('"');
    if trimmed.is_empty() || trimmed == TTL_FILE {
        return format!("_{}", trimmed);
    }
    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CacheDriver for FileCacheDriver {
    async fn has(&self, key: &str) -> bool {
        self.payload_file(key, None).await.is_some()
    }

    async fn has_validated(&self, key: &str, validator: &str) -> bool {
        self.payload_file(key, Some(validator)).await.is_some()
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let file = self.payload_file(key, None).await?;
        tokio::fs::read(&file).await.ok()
    }

    async fn get_validated(&self, key: &str, validator: &str) -> Option<Vec<u8>> {
        let file = self.payload_file(key, Some(validator)).await?;
        tokio::fs::read(&file).await.ok()
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.write_entry(key, CONTENT_FILE, value, ttl).await
    }

    async fn put_validated(
        &self,
        key: &str,
        validator: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.write_entry(key, &sanitize_validator(validator), value, ttl)
            .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.key_dir(key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            // Idempotent: not found is OK
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!(
                "Failed to delete cache entry {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FileCacheDriver::new(dir.path());

        driver.put("a:b", b"payload", None).await.unwrap();
        assert!(driver.has("a:b").await);
        assert_eq!(driver.get("a:b").await.unwrap(), b"payload");

        // The key directory is the hash of the key string.
        let key_dir = dir.path().join(stable_hash_hex(b"a:b"));
        assert!(key_dir.join("content").is_file());
        assert!(!key_dir.join("ttl").exists());
    }

    #[tokio::test]
    async fn test_ttl_file_layout_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FileCacheDriver::new(dir.path());

        driver
            .put("k", b"v", Some(Duration::from_millis(40)))
            .await
            .unwrap();
        let key_dir = dir.path().join(stable_hash_hex(b"k"));
        let ttl_text = std::fs::read_to_string(key_dir.join("ttl")).unwrap();
        assert!(ttl_text.trim().parse::<i64>().unwrap() > 0);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!driver.has("k").await);
        // Lazy expiry removed the whole entry directory.
        assert!(!key_dir.exists());
    }

    #[tokio::test]
    async fn test_validator_named_payload() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FileCacheDriver::new(dir.path());

        driver
            .put_validated("k", "etag-7", b"tagged", None)
            .await
            .unwrap();
        let key_dir = dir.path().join(stable_hash_hex(b"k"));
        assert!(key_dir.join("etag-7").is_file());

        assert!(driver.has_validated("k", "etag-7").await);
        assert!(!driver.has_validated("k", "etag-8").await);
        assert_eq!(driver.get_validated("k", "etag-7").await.unwrap(), b"tagged");
        // An untagged read still finds the single payload.
        assert_eq!(driver.get("k").await.unwrap(), b"tagged");
    }

    #[tokio::test]
    async fn test_del_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let driver = FileCacheDriver::new(dir.path());

        driver.put("k", b"v", None).await.unwrap();
        driver.del("k").await.unwrap();
        assert!(!driver.has("k").await);
        driver.del("k").await.unwrap();
    }
}
