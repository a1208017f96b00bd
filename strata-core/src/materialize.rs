//! Local materialization cache for remote blob content.
//!
//! Remote drivers use [`BlobCache`] to expose read-only local files for
//! content that is natively remote. Entries are keyed by (path, validator):
//! a hit is valid only while the cached validator matches the source's
//! current one; on mismatch the entry is refreshed under a new validator
//! file, never updated in place with stale content.
//!
//! The cache owns its directory tree exclusively and is its only writer.
//! No background eviction runs here; staleness is detected purely by
//! validator mismatch on the next access.

use crate::error::{Error, Result};
use crate::hash::stable_hash_hex;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Disk-backed materialization cache keyed by (path, validator).
#[derive(Debug)]
pub struct BlobCache {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl BlobCache {
    /// Create a cache rooted at the given directory.
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

    fn entry_path(&self, path: &str, validator: &str) -> PathBuf {
        self.root
            .join(stable_hash_hex(path.as_bytes()))
            .join(sanitize_validator(validator))
    }

    /// Look up a cached local file for (path, validator).
    ///
    /// Returns a hit only when an entry with the exact validator exists.
    pub async fn get(&self, path: &str, validator: &str) -> Option<PathBuf> {
        let entry = self.entry_path(path, validator);
        match tokio::fs::metadata(&entry).await {
            Ok(meta) if meta.is_file() => Some(entry),
            _ => None,
        }
    }

    /// Write content under a validator-scoped location and return it.
    ///
    /// Writes are serialized to avoid interleaved partial writes when two
    /// requests materialize the same object concurrently.
    pub async fn put(&self, path: &str, validator: &str, bytes: &[u8]) -> Result<PathBuf> {
        let _guard = self.write_lock.lock().await;
        let entry = self.entry_path(path, validator);
        let parent = entry
            .parent()
            .ok_or_else(|| Error::cache(format!("invalid cache entry path for '{}'", path)))?;

        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::io(format!(
                "Failed to create cache directory {}: {}",
                parent.display(),
                e
            ))
        })?;
        tokio::fs::write(&entry, bytes).await.map_err(|e| {
            Error::io(format!(
                "Failed to write cache entry {}: {}",
                entry.display(),
                e
            ))
        })?;

        debug!(path, validator, local = %entry.display(), "materialized remote content");
        Ok(entry)
    }
}

/// Normalize an opaque validator into a safe file name.
///
/// ETags commonly arrive quoted; quotes are stripped and any character
/// outside `[A-Za-z0-9._-]` maps to `_`.
fn sanitize_validator(validator: &str) -> String {
    let trimmed = validator.trim_matches('"');
    if trimmed.is_empty() {
        return "none".to_string();
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
