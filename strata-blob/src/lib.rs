//! # Strata Blob
//!
//! Blob store aggregator and built-in drivers.
//!
//! This crate provides:
//! - [`SourceConfig`] / [`ContentFilter`]: the configuration surface
//!   consumed (not owned) by the store
//! - [`DriverRegistry`] / [`SourceFactory`]: explicit typed driver
//!   discovery, built once at startup
//! - [`BlobStore`]: the precedence-ordered aggregator
//! - [`FsSource`]: filesystem driver
//! - [`MemSource`]: in-memory driver for tests and embedding
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata_blob::{BlobStore, DriverRegistry, FsSourceFactory, SourceConfig};
//! use std::sync::Arc;
//!
//! let mut registry = DriverRegistry::new();
//! registry.register("fs", Arc::new(FsSourceFactory::new("/data")));
//!
//! let sources = vec![SourceConfig::new("fs", "local").writable()];
//! let store = BlobStore::open(&sources, &registry).await;
//!
//! store.put("foo/bar.yml", b"hello").await?;
//! let bytes = store.content("foo/bar.yml").await;
//! ```

pub mod config;
pub mod fs;
pub mod mem;
pub mod registry;
pub mod store;

// Re-export main types
pub use config::{ContentFilter, SourceConfig};
pub use fs::{FsSource, FsSourceFactory};
pub use mem::{MemSource, MemSourceFactory};
pub use registry::{DriverRegistry, SourceFactory};
pub use store::BlobStore;

// Re-export core types commonly used with the store
pub use strata_core::{Blob, BlobSource, Error, Result, WalkFilter};
