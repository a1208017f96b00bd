//! Blob value types shared by every driver.
//!
//! A [`Blob`] describes one stored object: its path, size, modification
//! time, optional validator (ETag), optional content type, and a one-shot
//! content supplier. Drivers construct blobs per request; content is
//! realized lazily and **at most once** per instance — callers must not
//! assume repeated reads are cheap.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::fmt;
use std::path::PathBuf;

/// Sentinel for unknown size / modification time.
pub const UNKNOWN: i64 = -1;

/// One-shot content supplier backing a [`Blob`].
pub enum BlobBody {
    /// No content (metadata-only blob).
    Empty,
    /// Content already in memory.
    Bytes(Vec<u8>),
    /// Content backed by a local file, read on demand.
    File(PathBuf),
    /// Content produced by an async thunk (e.g. a remote fetch).
    Deferred(Box<dyn FnOnce() -> BoxFuture<'static, Result<Vec<u8>>> + Send>),
}

impl fmt::Debug for BlobBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobBody::Empty => f.write_str("Empty"),
            BlobBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            BlobBody::File(p) => f.debug_tuple("File").field(p).finish(),
            BlobBody::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// A stored object: metadata plus a one-shot content supplier.
#[derive(Debug)]
pub struct Blob {
    /// Store path of the object.
    pub path: String,
    /// Size in bytes, or [`UNKNOWN`].
    pub size: i64,
    /// Last modification time in epoch millis, or [`UNKNOWN`].
    pub last_modified: i64,
    /// Opaque validator (e.g. ETag) if the backend supplies one.
    pub etag: Option<String>,
    /// MIME content type if known.
    pub content_type: Option<String>,
    /// Content supplier, realized at most once via [`Blob::into_bytes`].
    pub body: BlobBody,
}

impl Blob {
    /// Metadata-only blob with unknown size/mtime and no content.
    pub fn metadata(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: UNKNOWN,
            last_modified: UNKNOWN,
            etag: None,
            content_type: None,
            body: BlobBody::Empty,
        }
    }

    /// Blob with in-memory content; size is taken from the buffer.
    pub fn from_bytes(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as i64;
        Self {
            path: path.into(),
            size,
            last_modified: UNKNOWN,
            etag: None,
            content_type: None,
            body: BlobBody::Bytes(bytes),
        }
    }

    /// Set the last-modified time (epoch millis).
    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = millis;
        self
    }

    /// Set the size in bytes.
    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    /// Set the validator.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the content supplier.
    pub fn with_body(mut self, body: BlobBody) -> Self {
        self.body = body;
        self
    }

    /// Realize the content, consuming the blob.
    ///
    /// Consuming `self` enforces the at-most-once contract on the supplier.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self.body {
            BlobBody::Empty => Err(Error::storage(format!(
                "blob '{}' carries no content",
                self.path
            ))),
            BlobBody::Bytes(bytes) => Ok(bytes),
            BlobBody::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| Error::io(format!("Failed to read {}: {}", path.display(), e))),
            BlobBody::Deferred(thunk) => thunk().await,
        }
    }
}

/// Walk-time attributes supplied per matched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathAttributes {
    /// True when the path names a stored object (vs. a container level).
    pub is_value: bool,
    /// True when the file name starts with a dot.
    pub is_hidden: bool,
}

impl PathAttributes {
    /// Attributes for a stored object at the given relative path.
    pub fn value(relative_path: &str) -> Self {
        Self {
            is_value: true,
            is_hidden: is_hidden_name(relative_path),
        }
    }

    /// Attributes for a synthesized container level.
    pub fn container(relative_path: &str) -> Self {
        Self {
            is_value: false,
            is_hidden: is_hidden_name(relative_path),
        }
    }
}

/// Leading-dot file name convention for hidden entries.
pub fn is_hidden_name(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
