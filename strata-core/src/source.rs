//! Driver traits for blob store backends.
//!
//! Backends implement a small trait family, split by capability:
//!
//! - [`BlobRead`]: non-mutating operations (stat, content, walk)
//! - [`BlobWrite`]: mutating operations (put, delete)
//! - [`LocalMaterialize`]: exposing a local file path for stored content
//! - [`BlobSource`]: the polymorphic driver handle with capability probes
//!
//! Read operations never fail for absence: a missing path yields
//! `false`/`None`/[`UNKNOWN`](crate::blob::UNKNOWN). Write operations on
//! remote backends surface transport failures as typed errors.

use crate::blob::{Blob, PathAttributes};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

/// Caller-supplied attribute predicate applied during a walk.
pub type AttributeMatcher<'a> = &'a (dyn Fn(&str, &PathAttributes) -> bool + Send + Sync);

/// Include/exclude path filter applied by each driver during a walk.
///
/// Patterns are literal path prefixes; a trailing `*` matches any suffix
/// (`config/*` matches `config/a.yml` and `config/sub/b.yml`). An empty
/// include list means "include everything".
#[derive(Debug, Clone, Default)]
pub struct WalkFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl WalkFilter {
    /// Filter that matches every path.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Whether a relative path passes the include/exclude filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| pattern_matches(p, path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| pattern_matches(p, path))
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => path == pattern,
    }
}

/// Non-mutating driver operations.
///
/// Absence is never an error on this trait: unreachable backends degrade
/// to the same signals as not-found.
#[async_trait]
pub trait BlobRead: Debug + Send + Sync {
    /// Configured label of this source (for logs and diagnostics).
    fn label(&self) -> &str;

    /// Whether this source claims the given path.
    ///
    /// True globally unless a prefix was configured, in which case only
    /// paths under that prefix are claimed.
    fn can_handle(&self, path: &str) -> bool;

    /// Whether an object exists at the path.
    async fn has(&self, path: &str) -> bool;

    /// Stat the object, returning metadata and a lazy content supplier.
    async fn get(&self, path: &str) -> Option<Blob>;

    /// Read the full content of the object.
    async fn content(&self, path: &str) -> Option<Vec<u8>>;

    /// Size in bytes, or [`UNKNOWN`](crate::blob::UNKNOWN) when absent.
    async fn size(&self, path: &str) -> i64;

    /// Modification time in epoch millis, or
    /// [`UNKNOWN`](crate::blob::UNKNOWN) when absent.
    async fn last_modified(&self, path: &str) -> i64;

    /// Bounded-depth scan under `path`.
    ///
    /// Returns paths relative to the walked root that pass both the
    /// include/exclude `filter` and the caller's attribute `matcher`.
    async fn walk(
        &self,
        path: &str,
        max_depth: usize,
        filter: &WalkFilter,
        matcher: AttributeMatcher<'_>,
    ) -> Vec<String>;
}

/// Mutating driver operations.
#[async_trait]
pub trait BlobWrite: Send + Sync {
    /// Write the full buffer, creating intermediate structure as needed.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the object. Idempotent: deleting an absent object succeeds.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Exposing stored content as a local file path.
#[async_trait]
pub trait LocalMaterialize: Send + Sync {
    /// A read-only local path for the object, materializing remote
    /// content through a cache when necessary.
    async fn read_local_path(&self, path: &str) -> Result<PathBuf>;

    /// A writable local path for the object, creating any needed
    /// directory structure. Fails on backends that cannot expose one.
    async fn write_local_path(&self, path: &str) -> Result<PathBuf>;
}

/// Polymorphic driver handle: read operations plus capability probes.
pub trait BlobSource: BlobRead {
    /// The write capability of this source, if it has one.
    fn writer(&self) -> Option<&dyn BlobWrite> {
        None
    }

    /// The local-path capability of this source, if it has one.
    fn local(&self) -> Option<&dyn LocalMaterialize> {
        None
    }
}

/// Prefix-based path claiming shared by drivers.
///
/// `None` claims everything; `Some(prefix)` claims the prefix itself and
/// anything under it.
pub fn prefix_claims(prefix: Option<&str>, path: &str) -> bool {
    match prefix {
        None => true,
        Some(p) => {
            let p = p.trim_end_matches('/');
            path == p || path.starts_with(&format!("{}/", p))
        }
    }
}

/// Strip a configured prefix from a claimed path.
///
/// Drivers map store paths onto their root after relativizing the prefix
/// away, so a source scoped to `config` stores `config/a.yml` at `a.yml`.
pub fn strip_prefix<'a>(prefix: Option<&str>, path: &'a str) -> &'a str {
    match prefix {
        None => path,
        Some(p) => {
            let p = p.trim_end_matches('/');
            path.strip_prefix(p)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(path)
        }
    }
}

/// Reconstruct a bounded-depth hierarchy from flat object keys.
///
/// Flat backends (object storage, in-memory maps) have no native
/// directories. Given object keys relative to the walked root, this
/// synthesizes every ancestor sub-path exactly once (per-call visited
/// set), marks `is_value` only at an object's own full depth, and applies
/// the include/exclude filter plus the caller's matcher to each candidate.
pub fn walk_flat_keys<I>(
    keys: I,
    max_depth: usize,
    filter: &WalkFilter,
    matcher: AttributeMatcher<'_>,
) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut visited = std::collections::HashSet::new();
    let mut results = Vec::new();

    for key in keys {
        let key = key.as_ref();
        let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        let full_depth = segments.len();

        for depth in 1..=full_depth.min(max_depth) {
            let sub_path = segments[..depth].join("/");
            if !visited.insert(sub_path.clone()) {
                continue;
            }

            let attrs = if depth == full_depth {
                PathAttributes::value(&sub_path)
            } else {
                PathAttributes::container(&sub_path)
            };
            if filter.matches(&sub_path) && matcher(&sub_path, &attrs) {
                results.push(sub_path);
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_empty_matches_all() {
        let filter = WalkFilter::all();
        assert!(filter.matches("anything/at/all.yml"));
    }

    #[test]
    fn test_filter_include_prefix() {
        let filter = WalkFilter::all().include("config/*");
        assert!(filter.matches("config/a.yml"));
        assert!(filter.matches("config/sub/b.yml"));
        assert!(!filter.matches("other/a.yml"));
    }

    #[test]
    fn test_filter_exclude_wins() {
        let filter = WalkFilter::all().include("config/*").exclude("config/secret/*");
        assert!(filter.matches("config/a.yml"));
        assert!(!filter.matches("config/secret/key.yml"));
    }

    #[test]
    fn test_filter_exact_pattern() {
        let filter = WalkFilter::all().include("config/a.yml");
        assert!(filter.matches("config/a.yml"));
        assert!(!filter.matches("config/a.yml.bak"));
    }

    #[test]
    fn test_prefix_claims() {
        assert!(prefix_claims(None, "any/path"));
        assert!(prefix_claims(Some("config"), "config"));
        assert!(prefix_claims(Some("config"), "config/a.yml"));
        assert!(prefix_claims(Some("config/"), "config/a.yml"));
        assert!(!prefix_claims(Some("config"), "configuration/a.yml"));
        assert!(!prefix_claims(Some("config"), "other/a.yml"));
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix(None, "a/b.yml"), "a/b.yml");
        assert_eq!(strip_prefix(Some("config"), "config/a.yml"), "a.yml");
        assert_eq!(strip_prefix(Some("config/"), "config/a.yml"), "a.yml");
        assert_eq!(strip_prefix(Some("config"), "other/a.yml"), "other/a.yml");
    }

    #[test]
    fn test_walk_flat_synthesizes_ancestors_once() {
        let keys = ["a/b/one.yml", "a/b/two.yml", "a/three.yml"];
        let all = WalkFilter::all();
        let results = walk_flat_keys(keys, 10, &all, &|_, _| true);
        assert_eq!(results, vec!["a", "a/b", "a/b/one.yml", "a/b/two.yml", "a/three.yml"]);
    }

    #[test]
    fn test_walk_flat_bounded_depth() {
        let keys = ["a/b/c/deep.yml"];
        let all = WalkFilter::all();
        let results = walk_flat_keys(keys, 2, &all, &|_, _| true);
        // The object itself lies beyond max_depth; only containers appear.
        assert_eq!(results, vec!["a", "a/b"]);
    }

    #[test]
    fn test_walk_flat_value_attribute_at_full_depth_only() {
        let keys = ["a/one.yml"];
        let all = WalkFilter::all();
        let values = walk_flat_keys(keys, 10, &all, &|_, attrs| attrs.is_value);
        assert_eq!(values, vec!["a/one.yml"]);
    }

    #[test]
    fn test_walk_flat_hidden_attribute() {
        let keys = ["a/.hidden.yml", "a/shown.yml"];
        let all = WalkFilter::all();
        let visible = walk_flat_keys(keys, 10, &all, &|_, attrs| !attrs.is_hidden);
        assert_eq!(visible, vec!["a", "a/shown.yml"]);
    }
}
