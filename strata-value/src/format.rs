//! Serialization formats for stored values.
//!
//! The codec supports a small closed set of formats: JSON is the primary
//! human-readable format and the legacy default for un-suffixed files,
//! YAML is the alternate human-readable format, and bincode is the
//! compact binary format used internally for hashing and cache keys.
//!
//! Serialization must be deterministic for unchanged values so that the
//! stable content hash holds: struct fields serialize in declaration
//! order, and value types omit absent optional fields.

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{Error, Result};

/// A supported value serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// Primary human-readable text format (default).
    Json,
    /// Alternate human-readable text format.
    Yaml,
    /// Compact binary format, for hashing/internal cache use only.
    Binary,
}

/// The documented legacy default for stored files without an extension.
pub const LEGACY_DEFAULT_FORMAT: ValueFormat = ValueFormat::Json;

impl Default for ValueFormat {
    fn default() -> Self {
        LEGACY_DEFAULT_FORMAT
    }
}

impl ValueFormat {
    /// Canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ValueFormat::Json => "json",
            ValueFormat::Yaml => "yaml",
            ValueFormat::Binary => "bin",
        }
    }

    /// Infer a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(ValueFormat::Json),
            "yaml" | "yml" => Some(ValueFormat::Yaml),
            "bin" => Some(ValueFormat::Binary),
            _ => None,
        }
    }

    /// Infer a format from a stored path's extension.
    pub fn from_path(path: &str) -> Option<Self> {
        path.rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// Whether this is one of the two human-readable text formats.
    pub fn is_text(&self) -> bool {
        matches!(self, ValueFormat::Json | ValueFormat::Yaml)
    }

    /// Serialize a value into this format.
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            ValueFormat::Json => Ok(serde_json::to_vec_pretty(value)?),
            ValueFormat::Yaml => {
                let text = serde_yaml::to_string(value)?;
                Ok(text.into_bytes())
            }
            ValueFormat::Binary => {
                bincode::serialize(value).map_err(|e| Error::decode(e.to_string()))
            }
        }
    }

    /// Deserialize a value from this format.
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            ValueFormat::Json => Ok(serde_json::from_slice(bytes)?),
            ValueFormat::Yaml => Ok(serde_yaml::from_slice(bytes)?),
            ValueFormat::Binary => {
                bincode::deserialize(bytes).map_err(|e| Error::decode(e.to_string()))
            }
        }
    }

    /// Parse a text document into a neutral JSON tree (for merging).
    pub fn to_tree(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        match self {
            ValueFormat::Json => Ok(serde_json::from_slice(bytes)?),
            ValueFormat::Yaml => Ok(serde_yaml::from_slice(bytes)?),
            ValueFormat::Binary => Err(Error::decode(
                "binary documents have no neutral tree form",
            )),
        }
    }

    /// Whether the payload is an explicit "null" document (a tombstone).
    ///
    /// `null` in JSON; `null` or `~` in YAML. Binary payloads are never
    /// tombstones.
    pub fn is_null_payload(&self, bytes: &[u8]) -> bool {
        if !self.is_text() {
            return false;
        }
        let Ok(text) = std::str::from_utf8(bytes) else {
            return false;
        };
        let trimmed = text.trim();
        match self {
            ValueFormat::Json => trimmed == "null",
            ValueFormat::Yaml => matches!(trimmed, "null" | "~" | "Null" | "NULL"),
            ValueFormat::Binary => false,
        }
    }
}
