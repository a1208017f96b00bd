//! # Strata S3 Storage
//!
//! S3 object-storage driver for the Strata blob store.
//!
//! ## Usage
//!
//! ```ignore
//! use strata_storage_s3::{S3Config, S3SourceFactory};
//! use strata_blob::{BlobStore, DriverRegistry, SourceConfig};
//! use strata_core::BlobCache;
//! use std::sync::Arc;
//!
//! // Load AWS SDK config
//! let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
//!
//! let s3_config = S3Config {
//!     bucket: "my-bucket".to_string(),
//!     root: Some("store".to_string()),
//!     timeout_ms: Some(30000),
//!     ..Default::default()
//! };
//! let cache = Arc::new(BlobCache::new("/var/cache/strata"));
//!
//! let mut registry = DriverRegistry::new();
//! registry.register("s3", Arc::new(S3SourceFactory::new(sdk_config, s3_config, cache)));
//!
//! let sources = vec![SourceConfig::new("s3", "remote").writable()];
//! let store = BlobStore::open(&sources, &registry).await;
//! ```

pub mod error;
pub mod s3;

// Re-export main types
pub use error::{Result, S3SourceError};
pub use s3::{S3Config, S3Source, S3SourceFactory};

// Re-export core traits for convenience
pub use strata_core::{BlobRead, BlobSource, BlobWrite, LocalMaterialize};
