//! In-memory blob source.
//!
//! A `HashMap`-backed driver with interior mutability, useful for tests
//! and for embedding without disk access. Supports reads and writes but
//! cannot expose local file paths.

use crate::config::{ContentFilter, SourceConfig};
use crate::registry::SourceFactory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use strata_core::{
    prefix_claims, walk_flat_keys, AttributeMatcher, Blob, BlobRead, BlobSource, BlobWrite,
    Result, WalkFilter, UNKNOWN,
};

#[derive(Debug, Clone)]
struct MemEntry {
    bytes: Vec<u8>,
    last_modified: i64,
}

/// In-memory blob source backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemSource {
    label: String,
    prefix: Option<String>,
    content_filter: ContentFilter,
    data: RwLock<HashMap<String, MemEntry>>,
}

impl MemSource {
    /// Create an unscoped in-memory source.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            prefix: None,
            content_filter: ContentFilter::All,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a source from a source configuration.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            label: config.label.clone(),
            prefix: config.prefix.clone(),
            content_filter: config.content_filter.clone(),
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Seed an entry directly (test convenience).
    ///
    /// Takes `&self` due to interior mutability.
    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.data.write().expect("RwLock poisoned").insert(
            path.into(),
            MemEntry {
                bytes,
                last_modified: now_millis(),
            },
        );
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(UNKNOWN)
}

#[async_trait]
impl BlobRead for MemSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_handle(&self, path: &str) -> bool {
        prefix_claims(self.prefix.as_deref(), path) && self.content_filter.accepts(path)
    }

    async fn has(&self, path: &str) -> bool {
        self.can_handle(path)
            && self
                .data
                .read()
                .expect("RwLock poisoned")
                .contains_key(path)
    }

    async fn get(&self, path: &str) -> Option<Blob> {
        if !self.can_handle(path) {
            return None;
        }
        let data = self.data.read().expect("RwLock poisoned");
        let entry = data.get(path)?;
        Some(
            Blob::from_bytes(path, entry.bytes.clone())
                .with_last_modified(entry.last_modified),
        )
    }

    async fn content(&self, path: &str) -> Option<Vec<u8>> {
        if !self.can_handle(path) {
            return None;
        }
        self.data
            .read()
            .expect("RwLock poisoned")
            .get(path)
            .map(|e| e.bytes.clone())
    }

    async fn size(&self, path: &str) -> i64 {
        if !self.can_handle(path) {
            return UNKNOWN;
        }
        self.data
            .read()
            .expect("RwLock poisoned")
            .get(path)
            .map(|e| e.bytes.len() as i64)
            .unwrap_or(UNKNOWN)
    }

    async fn last_modified(&self, path: &str) -> i64 {
        if !self.can_handle(path) {
            return UNKNOWN;
        }
        self.data
            .read()
            .expect("RwLock poisoned")
            .get(path)
            .map(|e| e.last_modified)
            .unwrap_or(UNKNOWN)
    }

    async fn walk(
        &self,
        path: &str,
        max_depth: usize,
        filter: &WalkFilter,
        matcher: AttributeMatcher<'_>,
    ) -> Vec<String> {
        let root = path.trim_matches('/');
        let keys: Vec<String> = {
            let data = self.data.read().expect("RwLock poisoned");
            data.keys()
                .filter(|k| self.can_handle(k))
                .filter_map(|k| relative_to(root, k))
                .collect()
        };
        let mut keys = keys;
        keys.sort();
        walk_flat_keys(keys, max_depth, filter, matcher)
    }
}

fn relative_to(root: &str, key: &str) -> Option<String> {
    if root.is_empty() {
        return Some(key.to_string());
    }
    key.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
}

#[async_trait]
impl BlobWrite for MemSource {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.data.write().expect("RwLock poisoned").insert(
            path.to_string(),
            MemEntry {
                bytes: bytes.to_vec(),
                last_modified: now_millis(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        // Idempotent: ok even if not found
        self.data.write().expect("RwLock poisoned").remove(path);
        Ok(())
    }
}

impl BlobSource for MemSource {
    fn writer(&self) -> Option<&dyn BlobWrite> {
        Some(self)
    }
}

/// Factory for in-memory sources.
#[derive(Debug, Default)]
pub struct MemSourceFactory;

#[async_trait]
impl SourceFactory for MemSourceFactory {
    async fn create(&self, config: &SourceConfig) -> Result<Arc<dyn BlobSource>> {
        Ok(Arc::new(MemSource::from_config(config)))
    }
}
