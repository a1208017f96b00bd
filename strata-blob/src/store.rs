//! Blob store aggregator.
//!
//! [`BlobStore`] presents one logical hierarchical store over N configured
//! sources, enforcing the readable/writable partition. Sources are
//! resolved once at startup from a [`DriverRegistry`] and the resulting
//! driver lists are immutable for the store's lifetime, so concurrent
//! reads need no locking.
//!
//! ## Precedence
//!
//! Configuration lists most-specific/highest-priority sources first.
//! Resolution runs in reverse declared order with each resolved driver
//! prepended, so the earliest-declared source ends up at the head of the
//! chain and wins first-match reads.
//!
//! ## Failure semantics
//!
//! A source whose driver cannot be initialized is skipped with a warning;
//! a source type with no registered driver is a logged misconfiguration.
//! Either way the store starts degraded with whatever resolved. Writes to
//! a read-only store, or to a path no writer claims, are silent no-ops
//! with a logged error; callers that need a failure signal must check
//! [`BlobStore::is_read_only`] up front.

use crate::config::SourceConfig;
use crate::registry::DriverRegistry;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use strata_core::{
    AttributeMatcher, Blob, BlobRead, BlobSource, BlobWrite, LocalMaterialize, Result,
    WalkFilter, UNKNOWN,
};
use tracing::{debug, error, warn};

/// Aggregates an ordered list of resolved sources into one logical store.
#[derive(Debug)]
pub struct BlobStore {
    readers: Vec<Arc<dyn BlobSource>>,
    writers: Vec<Arc<dyn BlobSource>>,
}

impl BlobStore {
    /// Resolve the configured sources against the registry.
    ///
    /// Never fails: unresolvable sources are logged and skipped, and the
    /// store operates with whatever remains.
    pub async fn open(sources: &[SourceConfig], registry: &DriverRegistry) -> Self {
        let mut readers: Vec<Arc<dyn BlobSource>> = Vec::new();
        let mut writers: Vec<Arc<dyn BlobSource>> = Vec::new();

        // Later-declared sources are initialized first; prepending each
        // resolved driver leaves the earliest-declared at the head.
        for config in sources.iter().rev() {
            let factory = match registry.get(&config.source_type) {
                Some(factory) => factory,
                None => {
                    error!(
                        source_type = %config.source_type,
                        label = %config.label,
                        "no driver registered for source type"
                    );
                    continue;
                }
            };

            let source = match factory.create(config).await {
                Ok(source) => source,
                Err(e) => {
                    warn!(
                        source_type = %config.source_type,
                        label = %config.label,
                        "skipping source, driver unavailable: {}",
                        e
                    );
                    continue;
                }
            };

            if config.writable && source.writer().is_some() {
                writers.insert(0, source.clone());
            }
            readers.insert(0, source);
        }

        debug!(
            readers = readers.len(),
            writers = writers.len(),
            "blob store resolved"
        );
        Self { readers, writers }
    }

    /// Build a store directly from resolved sources (test convenience).
    ///
    /// `sources` is in declared order; every entry reads, entries flagged
    /// true also write.
    pub fn from_sources(sources: Vec<(Arc<dyn BlobSource>, bool)>) -> Self {
        let mut readers = Vec::new();
        let mut writers = Vec::new();
        for (source, writable) in sources {
            if writable && source.writer().is_some() {
                writers.push(source.clone());
            }
            readers.push(source);
        }
        Self { readers, writers }
    }

    /// Whether the store has no writable source at all.
    pub fn is_read_only(&self) -> bool {
        self.writers.is_empty()
    }

    /// The first writer claiming the path, logging when none does.
    fn write_target(&self, path: &str) -> Option<&Arc<dyn BlobSource>> {
        let target = self.writers.iter().find(|w| w.can_handle(path));
        if target.is_none() {
            error!(path, "no writable source claims path");
        }
        target
    }

    /// Whether any reader has the path.
    pub async fn has(&self, path: &str) -> bool {
        for reader in &self.readers {
            if reader.has(path).await {
                return true;
            }
        }
        false
    }

    /// Whether the writable source for the path has it.
    pub async fn has_writable(&self, path: &str) -> bool {
        match self.write_target(path) {
            Some(writer) => writer.has(path).await,
            None => false,
        }
    }

    /// Content from the first reader that has the path.
    pub async fn content(&self, path: &str) -> Option<Vec<u8>> {
        for reader in &self.readers {
            if let Some(bytes) = reader.content(path).await {
                return Some(bytes);
            }
        }
        None
    }

    /// Content from the writable source for the path.
    pub async fn content_writable(&self, path: &str) -> Option<Vec<u8>> {
        self.write_target(path)?.content(path).await
    }

    /// Blob metadata from the first reader that has the path.
    pub async fn get(&self, path: &str) -> Option<Blob> {
        for reader in &self.readers {
            if let Some(blob) = reader.get(path).await {
                return Some(blob);
            }
        }
        None
    }

    /// Blob metadata from the writable source for the path.
    pub async fn get_writable(&self, path: &str) -> Option<Blob> {
        self.write_target(path)?.get(path).await
    }

    /// Size from the first reader that knows it, else `-1`.
    pub async fn size(&self, path: &str) -> i64 {
        for reader in &self.readers {
            let size = reader.size(path).await;
            if size != UNKNOWN {
                return size;
            }
        }
        UNKNOWN
    }

    /// Size from the writable source for the path, else `-1`.
    pub async fn size_writable(&self, path: &str) -> i64 {
        match self.write_target(path) {
            Some(writer) => writer.size(path).await,
            None => UNKNOWN,
        }
    }

    /// Modification time from the first reader that knows it, else `-1`.
    pub async fn last_modified(&self, path: &str) -> i64 {
        for reader in &self.readers {
            let millis = reader.last_modified(path).await;
            if millis != UNKNOWN {
                return millis;
            }
        }
        UNKNOWN
    }

    /// Modification time from the writable source for the path, else `-1`.
    pub async fn last_modified_writable(&self, path: &str) -> i64 {
        match self.write_target(path) {
            Some(writer) => writer.last_modified(path).await,
            None => UNKNOWN,
        }
    }

    /// Union of every reader's walk, deduplicated by relative path.
    ///
    /// Each reader applies its own filtering; the aggregator only
    /// deduplicates, preserving first-seen order.
    pub async fn walk(
        &self,
        path: &str,
        max_depth: usize,
        filter: &WalkFilter,
        matcher: AttributeMatcher<'_>,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for reader in &self.readers {
            for entry in reader.walk(path, max_depth, filter, matcher).await {
                if seen.insert(entry.clone()) {
                    results.push(entry);
                }
            }
        }
        results
    }

    /// Write through the first writer claiming the path.
    ///
    /// On a read-only store, or when no writer claims the path, this is a
    /// silent no-op with a logged error. Transport failures from the
    /// chosen driver propagate.
    pub async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        if self.is_read_only() {
            error!(path, "put on read-only blob store");
            return Ok(());
        }
        match self.write_target(path) {
            Some(writer) => {
                // write_target only returns sources that report write support
                writer
                    .writer()
                    .expect("writable source lost write capability")
                    .put(path, bytes)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Delete through the first writer claiming the path.
    ///
    /// Same no-op semantics as [`put`](Self::put).
    pub async fn delete(&self, path: &str) -> Result<()> {
        if self.is_read_only() {
            error!(path, "delete on read-only blob store");
            return Ok(());
        }
        match self.write_target(path) {
            Some(writer) => {
                writer
                    .writer()
                    .expect("writable source lost write capability")
                    .delete(path)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Resolve the path to a local file.
    ///
    /// For `writable`, the first writer that claims the path and exposes
    /// local paths answers (creating directory structure). Otherwise the
    /// first reader that has the path and exposes local paths answers,
    /// possibly materializing remote content. No match is a logged error
    /// and yields `None`.
    pub async fn local_path(&self, path: &str, writable: bool) -> Option<PathBuf> {
        if writable {
            for writer in &self.writers {
                if !writer.can_handle(path) {
                    continue;
                }
                let Some(local) = writer.local() else { continue };
                match local.write_local_path(path).await {
                    Ok(file) => return Some(file),
                    Err(e) => {
                        warn!(path, label = %writer.label(), "writable local path failed: {}", e);
                        continue;
                    }
                }
            }
        } else {
            for reader in &self.readers {
                if !reader.has(path).await {
                    continue;
                }
                let Some(local) = reader.local() else { continue };
                match local.read_local_path(path).await {
                    Ok(file) => return Some(file),
                    Err(e) => {
                        warn!(path, label = %reader.label(), "local materialization failed: {}", e);
                        continue;
                    }
                }
            }
        }
        error!(path, writable, "no source can expose a local path");
        None
    }
}
