//! # Strata Core
//!
//! Core types and driver traits for the Strata blob/value store.
//!
//! This crate provides:
//! - [`Identifier`]: hierarchical addresses with a strict total order
//! - [`Blob`] / [`PathAttributes`]: stored-object value types
//! - The driver trait family ([`BlobRead`], [`BlobWrite`],
//!   [`LocalMaterialize`], [`BlobSource`]) that backends implement
//! - [`BlobCache`]: validator-keyed local materialization of remote content
//! - Stable 128-bit content hashing
//!
//! ## Design Principles
//!
//! 1. **Async at the I/O seam only**: driver operations are async; pure
//!    types stay synchronous
//! 2. **Absence is not an error**: read operations degrade to
//!    `false`/`None`/`-1`, never raise for not-found
//! 3. **Capability probing over downcasting**: write and local-path
//!    support are optional capabilities a driver reports explicitly

pub mod blob;
pub mod error;
pub mod hash;
pub mod identifier;
pub mod materialize;
pub mod source;

// Re-export main types
pub use blob::{is_hidden_name, Blob, BlobBody, PathAttributes, UNKNOWN};
pub use error::{Error, Result};
pub use hash::{stable_hash, stable_hash_hex};
pub use identifier::Identifier;
pub use materialize::BlobCache;
pub use source::{
    prefix_claims, strip_prefix, walk_flat_keys, AttributeMatcher, BlobRead, BlobSource,
    BlobWrite, LocalMaterialize, WalkFilter,
};
