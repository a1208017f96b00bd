//! # Strata Cache
//!
//! Ephemeral key/value result cache with pluggable drivers.
//!
//! The same backend-abstraction idiom as the blob store, but with one
//! active driver and no fallback chain: [`ResultCache::open`] selects the
//! preferred driver at startup and falls back to in-memory when it cannot
//! initialize. TTL is enforced lazily on the read path; there is no
//! background sweep.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata_cache::{FileCacheDriver, ResultCache};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let mut drivers = HashMap::new();
//! drivers.insert("file".to_string(),
//!     Arc::new(FileCacheDriver::new("/var/cache/strata")) as _);
//! let cache = ResultCache::open("file", drivers);
//!
//! cache.put(&["render", "home"], &result, Some(ttl)).await?;
//! let hit: Option<Rendered> = cache.get(&["render", "home"]).await;
//! ```

pub mod cache;
pub mod driver;
pub mod fs;
pub mod memory;

// Re-export main types
pub use cache::ResultCache;
pub use driver::CacheDriver;
pub use fs::FileCacheDriver;
pub use memory::MemoryCacheDriver;

// Re-export core error types
pub use strata_core::{Error, Result};
