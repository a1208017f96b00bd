//! Configuration types for blob store sources.
//!
//! Host applications describe their backends as an ordered list of
//! [`SourceConfig`] entries; the list order is the precedence order
//! (most-specific/highest-priority sources first). The types deserialize
//! from JSON so the list can live in an application configuration file.

use serde::{Deserialize, Serialize};

/// Which kind of content a source stores.
///
/// `All` places no restriction; `Kind` restricts the source to paths whose
/// file extension matches the named kind (e.g. `yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    /// Store any content.
    All,
    /// Store only content of the named kind (matched by file extension).
    Kind(String),
}

impl Default for ContentFilter {
    fn default() -> Self {
        ContentFilter::All
    }
}

impl ContentFilter {
    /// Whether a path passes this filter.
    pub fn accepts(&self, path: &str) -> bool {
        match self {
            ContentFilter::All => true,
            ContentFilter::Kind(kind) => path
                .rsplit('/')
                .next()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.eq_ignore_ascii_case(kind))
                .unwrap_or(false),
        }
    }
}

/// One configured blob store source.
///
/// A driver is matched to a source by `source_type`. An absent `prefix`
/// means the source handles every path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Driver type to instantiate (e.g. `"fs"`, `"s3"`, `"memory"`).
    #[serde(rename = "type")]
    pub source_type: String,
    /// Human-readable label used in logs.
    pub label: String,
    /// Optional path prefix scoping which paths this source claims.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Which kind of content this source stores.
    #[serde(default)]
    pub content_filter: ContentFilter,
    /// Whether this source may serve writes.
    #[serde(default)]
    pub writable: bool,
}

impl SourceConfig {
    /// Create a read-only source with no prefix restriction.
    pub fn new(source_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            label: label.into(),
            prefix: None,
            content_filter: ContentFilter::All,
            writable: false,
        }
    }

    /// Scope this source to a path prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Restrict this source to one content kind.
    pub fn with_content_filter(mut self, filter: ContentFilter) -> Self {
        self.content_filter = filter;
        self
    }

    /// Mark this source writable.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}
