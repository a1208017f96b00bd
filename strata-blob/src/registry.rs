//! Typed driver registry for blob store sources.
//!
//! Drivers register a [`SourceFactory`] under their type string at process
//! startup; the registry is built once and injected into
//! [`BlobStore::open`](crate::store::BlobStore::open). There are no
//! runtime hot-plug semantics: the registry is immutable once the store
//! is constructed.

use crate::config::SourceConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{BlobSource, Result};

/// Constructs a driver instance for a configured source.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Build a driver for the given source configuration.
    ///
    /// A factory may fail when its backend dependency is unavailable;
    /// the store skips such sources and continues degraded.
    async fn create(&self, config: &SourceConfig) -> Result<Arc<dyn BlobSource>>;
}

/// Registry mapping source type strings to driver factories.
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn SourceFactory>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a source type, replacing any previous one.
    pub fn register(
        &mut self,
        source_type: impl Into<String>,
        factory: Arc<dyn SourceFactory>,
    ) -> &mut Self {
        self.factories.insert(source_type.into(), factory);
        self
    }

    /// Look up the factory for a source type.
    pub fn get(&self, source_type: &str) -> Option<&Arc<dyn SourceFactory>> {
        self.factories.get(source_type)
    }

    /// Registered source types, for diagnostics.
    pub fn types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("types", &self.types())
            .finish()
    }
}
