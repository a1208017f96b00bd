//! Hierarchical addresses for blob and value store entries.
//!
//! An [`Identifier`] is an ordered sequence of path segments plus a leaf id.
//! Its canonical string form is the slash-joined path
//! `{path0}/{path1}/.../{id}`; [`Identifier::parse`] is the exact inverse
//! of [`Identifier::to_path`].
//!
//! Identifiers are totally ordered: shorter paths sort first, equal-length
//! paths compare segment-by-segment, ties break on the id. This ordering is
//! used wherever entries must be enumerated deterministically.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Hierarchical address: ordered path segments plus a leaf id.
///
/// Invariants: `id` is never empty; no path segment is empty; neither may
/// contain `/` (it is the segment separator in the canonical form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    path: Vec<String>,
    id: String,
}

impl Identifier {
    /// Create an identifier from path segments and a leaf id.
    pub fn new<P, S>(path: P, id: impl Into<String>) -> Result<Self>
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let path: Vec<String> = path.into_iter().map(Into::into).collect();

        if id.is_empty() {
            return Err(Error::invalid_identifier("id must not be empty"));
        }
        if id.contains('/') {
            return Err(Error::invalid_identifier(format!(
                "id must not contain '/': {}",
                id
            )));
        }
        for segment in &path {
            if segment.is_empty() {
                return Err(Error::invalid_identifier("path segment must not be empty"));
            }
            if segment.contains('/') {
                return Err(Error::invalid_identifier(format!(
                    "path segment must not contain '/': {}",
                    segment
                )));
            }
        }

        Ok(Self { path, id })
    }

    /// Create an identifier with no path segments.
    pub fn root(id: impl Into<String>) -> Result<Self> {
        Self::new(Vec::<String>::new(), id)
    }

    /// The leaf id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The ordered path segments.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Canonical slash-joined form: `{path0}/.../{pathN}/{id}`.
    pub fn to_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            out.push_str(segment);
            out.push('/');
        }
        out.push_str(&self.id);
        out
    }

    /// Parse the canonical slash-joined form. Exact inverse of [`to_path`].
    ///
    /// [`to_path`]: Identifier::to_path
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments: Vec<&str> = s.split('/').collect();
        let id = segments
            .pop()
            .filter(|last| !last.is_empty())
            .ok_or_else(|| Error::invalid_identifier(format!("missing id in '{}'", s)))?;
        Self::new(segments, id)
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Shorter path first, then segment-by-segment, then id.
        self.path
            .len()
            .cmp(&other.path.len())
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
