//! Filesystem blob source.
//!
//! Maps every claimed path directly onto a root directory; a configured
//! prefix is relativized away before the remainder is appended to the
//! root. The driver's local representation *is* its storage
//! representation, so local-path exposure needs no caching layer.

use crate::config::{ContentFilter, SourceConfig};
use crate::registry::SourceFactory;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use strata_core::{
    prefix_claims, strip_prefix, AttributeMatcher, Blob, BlobBody, BlobRead, BlobSource,
    BlobWrite, Error, LocalMaterialize, PathAttributes, Result, WalkFilter, UNKNOWN,
};
use tracing::warn;

/// Filesystem-backed blob source rooted at a directory.
#[derive(Debug)]
pub struct FsSource {
    label: String,
    root: PathBuf,
    prefix: Option<String>,
    content_filter: ContentFilter,
}

impl FsSource {
    /// Create an unscoped source rooted at `root`.
    pub fn new(label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            root: root.into(),
            prefix: None,
            content_filter: ContentFilter::All,
        }
    }

    /// Create a source from a source configuration.
    pub fn from_config(config: &SourceConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            label: config.label.clone(),
            root: root.into(),
            prefix: config.prefix.clone(),
            content_filter: config.content_filter.clone(),
        }
    }

    /// The root directory of this source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path to a file path under the root.
    ///
    /// Disallows absolute paths and path traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = strip_prefix(self.prefix.as_deref(), path);
        let p = Path::new(relative);

        if p.is_absolute()
            || p.components().any(|c| {
                matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
            })
        {
            return Err(Error::storage(format!(
                "Invalid store path '{}': must be a relative path without '..'",
                path
            )));
        }

        Ok(self.root.join(p))
    }
}

fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(UNKNOWN)
}

#[async_trait]
impl BlobRead for FsSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_handle(&self, path: &str) -> bool {
        prefix_claims(self.prefix.as_deref(), path) && self.content_filter.accepts(path)
    }

    async fn has(&self, path: &str) -> bool {
        if !self.can_handle(path) {
            return false;
        }
        match self.resolve(path) {
            Ok(file) => tokio::fs::metadata(&file)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn get(&self, path: &str) -> Option<Blob> {
        if !self.can_handle(path) {
            return None;
        }
        let file = self.resolve(path).ok()?;
        let meta = tokio::fs::metadata(&file).await.ok()?;
        if !meta.is_file() {
            return None;
        }
        Some(
            Blob::metadata(path)
                .with_size(meta.len() as i64)
                .with_last_modified(mtime_millis(&meta))
                .with_body(BlobBody::File(file)),
        )
    }

    async fn content(&self, path: &str) -> Option<Vec<u8>> {
        if !self.can_handle(path) {
            return None;
        }
        let file = self.resolve(path).ok()?;
        tokio::fs::read(&file).await.ok()
    }

    async fn size(&self, path: &str) -> i64 {
        if !self.can_handle(path) {
            return UNKNOWN;
        }
        match self.resolve(path) {
            Ok(file) => tokio::fs::metadata(&file)
                .await
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len() as i64)
                .unwrap_or(UNKNOWN),
            Err(_) => UNKNOWN,
        }
    }

    async fn last_modified(&self, path: &str) -> i64 {
        if !self.can_handle(path) {
            return UNKNOWN;
        }
        match self.resolve(path) {
            Ok(file) => tokio::fs::metadata(&file)
                .await
                .ok()
                .filter(|m| m.is_file())
                .map(|m| mtime_millis(&m))
                .unwrap_or(UNKNOWN),
            Err(_) => UNKNOWN,
        }
    }

    async fn walk(
        &self,
        path: &str,
        max_depth: usize,
        filter: &WalkFilter,
        matcher: AttributeMatcher<'_>,
    ) -> Vec<String> {
        let walk_root = match self.resolve(path.trim_matches('/')) {
            Ok(dir) => dir,
            Err(_) => return Vec::new(),
        };
        if max_depth == 0 || !walk_root.is_dir() {
            return Vec::new();
        }

        let mut results = Vec::new();
        // Depth-bounded scan; each stack entry is (directory, depth of its children).
        let mut dirs_to_visit = vec![(walk_root.clone(), 1usize)];

        while let Some((dir, depth)) = dirs_to_visit.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            let mut children = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                children.push(entry.path());
            }
            children.sort();

            for child in children {
                let relative = match child.strip_prefix(&walk_root) {
                    Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                let is_dir = child.is_dir();
                let attrs = if is_dir {
                    PathAttributes::container(&relative)
                } else {
                    PathAttributes::value(&relative)
                };
                if filter.matches(&relative) && matcher(&relative, &attrs) {
                    results.push(relative);
                }
                if is_dir && depth < max_depth {
                    dirs_to_visit.push((child, depth + 1));
                }
            }
        }

        results.sort();
        results
    }
}

#[async_trait]
impl BlobWrite for FsSource {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let file = self.resolve(path)?;

        // Write only if the target is absent or writable.
        if let Ok(meta) = tokio::fs::metadata(&file).await {
            if meta.permissions().readonly() {
                warn!(label = %self.label, path, "refusing to overwrite read-only target");
                return Ok(());
            }
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&file, bytes)
            .await
            .map_err(|e| Error::io(format!("Failed to write {}: {}", file.display(), e)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            // Idempotent: not found is OK
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!(
                "Failed to delete {}: {}",
                file.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl LocalMaterialize for FsSource {
    async fn read_local_path(&self, path: &str) -> Result<PathBuf> {
        self.resolve(path)
    }

    async fn write_local_path(&self, path: &str) -> Result<PathBuf> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(file)
    }
}

impl BlobSource for FsSource {
    fn writer(&self) -> Option<&dyn BlobWrite> {
        Some(self)
    }

    fn local(&self) -> Option<&dyn LocalMaterialize> {
        Some(self)
    }
}

/// Factory for filesystem sources sharing one base directory.
#[derive(Debug)]
pub struct FsSourceFactory {
    root: PathBuf,
}

impl FsSourceFactory {
    /// Factory whose sources resolve under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceFactory for FsSourceFactory {
    async fn create(&self, config: &SourceConfig) -> Result<Arc<dyn BlobSource>> {
        if !self.root.is_dir() {
            return Err(Error::storage(format!(
                "filesystem source root {} is not a directory",
                self.root.display()
            )));
        }
        Ok(Arc::new(FsSource::from_config(config, &self.root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(dir: &tempfile::TempDir) -> FsSource {
        FsSource::new("fs", dir.path())
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        fs.put("foo/bar.yml", b"hello").await.unwrap();
        assert!(fs.has("foo/bar.yml").await);
        assert_eq!(fs.content("foo/bar.yml").await.unwrap(), b"hello");
        assert_eq!(fs.size("foo/bar.yml").await, 5);
        assert!(fs.last_modified("foo/bar.yml").await > 0);

        let blob = fs.get("foo/bar.yml").await.unwrap();
        assert_eq!(blob.size, 5);
        assert_eq!(blob.into_bytes().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_absent_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        assert!(!fs.has("missing.yml").await);
        assert!(fs.get("missing.yml").await.is_none());
        assert_eq!(fs.size("missing.yml").await, UNKNOWN);
        assert_eq!(fs.last_modified("missing.yml").await, UNKNOWN);
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        assert!(fs.put("../outside.yml", b"x").await.is_err());
        assert!(!fs.has("../outside.yml").await);
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        fs.put("a.yml", b"x").await.unwrap();
        fs.delete("a.yml").await.unwrap();
        assert!(!fs.has("a.yml").await);
        fs.delete("a.yml").await.unwrap();
    }

    #[tokio::test]
    async fn test_walk_depth_and_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        fs.put("foo/bar.yml", b"1").await.unwrap();
        fs.put("foo/sub/deep.yml", b"2").await.unwrap();

        let all = WalkFilter::all();
        let shallow = fs.walk("foo", 1, &all, &|_, _| true).await;
        assert_eq!(shallow, vec!["bar.yml", "sub"]);

        let deep = fs.walk("foo", 2, &all, &|_, _| true).await;
        assert_eq!(deep, vec!["bar.yml", "sub", "sub/deep.yml"]);

        let values_only = fs.walk("foo", 2, &all, &|_, attrs| attrs.is_value).await;
        assert_eq!(values_only, vec!["bar.yml", "sub/deep.yml"]);
    }

    #[tokio::test]
    async fn test_walk_filter() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        fs.put("foo/keep.yml", b"1").await.unwrap();
        fs.put("foo/drop.json", b"2").await.unwrap();

        let filter = WalkFilter::all().exclude("drop.json");
        let results = fs.walk("foo", 1, &filter, &|_, _| true).await;
        assert_eq!(results, vec!["keep.yml"]);
    }

    #[tokio::test]
    async fn test_prefix_relativized() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig::new("fs", "scoped").with_prefix("config");
        let fs = FsSource::from_config(&config, dir.path());

        fs.put("config/a.yml", b"x").await.unwrap();
        // Stored relative to root with the prefix stripped.
        assert!(dir.path().join("a.yml").is_file());
        assert!(fs.has("config/a.yml").await);
        assert!(!fs.can_handle("other/a.yml"));
    }

    #[tokio::test]
    async fn test_local_paths() {
        let dir = tempfile::tempdir().unwrap();
        let fs = source(&dir);

        fs.put("foo/bar.yml", b"x").await.unwrap();
        let read = fs.read_local_path("foo/bar.yml").await.unwrap();
        assert_eq!(read, dir.path().join("foo/bar.yml"));

        let write = fs.write_local_path("new/sub/file.yml").await.unwrap();
        assert_eq!(write, dir.path().join("new/sub/file.yml"));
        assert!(dir.path().join("new/sub").is_dir());
    }
}
