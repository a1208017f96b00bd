//! # Strata Value
//!
//! Typed value store and format-negotiating codec over the blob store.
//!
//! This crate provides:
//! - [`ValueFormat`]: JSON (default), YAML, and bincode binary codecs
//!   with file-extension inference and explicit-null tombstone detection
//! - The decode pipeline: [`BytePreprocessor`] (variable substitution),
//!   [`DecodeMiddleware`] ([`SnapshotMerge`] partial-update merging,
//!   [`VersionedDecode`] schema migration) with single-recovery fallback
//! - [`ValueCodec`]: the assembled codec with stable content hashing
//! - [`ValueStore`]: typed get/put/delete by [`Identifier`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata_value::{ValueCodec, ValueStore};
//!
//! let codec = ValueCodec::new();
//! let store = ValueStore::new(blobs, codec);
//!
//! let id = Identifier::parse("things/lamp")?;
//! store.put(&id, &lamp).await?;
//! let loaded = store.get(&id).await?;
//! ```

pub mod codec;
pub mod format;
pub mod pipeline;
pub mod store;

// Re-export main types
pub use codec::ValueCodec;
pub use format::{ValueFormat, LEGACY_DEFAULT_FORMAT};
pub use pipeline::{
    merge_fields, stored_version, BytePreprocessor, DecodeMiddleware, Migrator, SnapshotCache,
    SnapshotMerge, VariableSubstitution, VersionedDecode, VersionedEntity,
    STORAGE_VERSION_FIELD,
};
pub use store::ValueStore;

// Re-export core types commonly used with values
pub use strata_core::{Error, Identifier, Result};
