//! Typed façade over a blob store and a value codec.
//!
//! [`ValueStore`] resolves an [`Identifier`] to backing bytes through the
//! blob store's precedence chain, negotiates the serialization format
//! from the stored file extension (falling back to the legacy default for
//! un-suffixed files), and runs the codec's decode pipeline. The write
//! path is the mirror: serialize, then route through the blob store's
//! writable chain.

use crate::codec::ValueCodec;
use crate::format::{ValueFormat, LEGACY_DEFAULT_FORMAT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use strata_blob::BlobStore;
use strata_core::{stable_hash_hex, Identifier, Result};
use tracing::debug;

/// Typed get/put/delete over a blob store + codec pair.
pub struct ValueStore<T> {
    blobs: Arc<BlobStore>,
    codec: ValueCodec<T>,
}

impl<T> ValueStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Create a store over the given blob store and codec.
    pub fn new(blobs: Arc<BlobStore>, codec: ValueCodec<T>) -> Self {
        Self { blobs, codec }
    }

    /// The underlying codec.
    pub fn codec(&self) -> &ValueCodec<T> {
        &self.codec
    }

    /// Candidate stored paths for an identifier, most-preferred first.
    ///
    /// Known extensions are probed in format order; the bare path comes
    /// last for backward compatibility with older un-suffixed files.
    fn candidates(id: &Identifier) -> Vec<(String, ValueFormat)> {
        let base = id.to_path();
        vec![
            (format!("{}.json", base), ValueFormat::Json),
            (format!("{}.yaml", base), ValueFormat::Yaml),
            (format!("{}.yml", base), ValueFormat::Yaml),
            (base, LEGACY_DEFAULT_FORMAT),
        ]
    }

    /// Read and decode the value stored under the identifier.
    ///
    /// Returns `Ok(None)` when nothing is stored, or when the stored
    /// payload is an explicit-null tombstone.
    pub async fn get(&self, id: &Identifier) -> Result<Option<T>> {
        for (path, format) in Self::candidates(id) {
            if let Some(bytes) = self.blobs.content(&path).await {
                debug!(id = %id, path, ?format, "decoding stored value");
                return self.codec.decode(id, format, &bytes).await;
            }
        }
        Ok(None)
    }

    /// Serialize and store the value in the codec's default format.
    pub async fn put(&self, id: &Identifier, value: &T) -> Result<()> {
        self.put_as(id, value, self.codec.default_format()).await
    }

    /// Serialize and store the value in an explicit format.
    pub async fn put_as(&self, id: &Identifier, value: &T, format: ValueFormat) -> Result<()> {
        let path = format!("{}.{}", id.to_path(), format.extension());
        let bytes = self.codec.encode(value, format)?;
        self.blobs.put(&path, &bytes).await
    }

    /// Store an explicit-null tombstone in the codec's default format.
    pub async fn put_tombstone(&self, id: &Identifier) -> Result<()> {
        let format = self.codec.default_format();
        let path = format!("{}.{}", id.to_path(), format.extension());
        self.blobs.put(&path, b"null").await
    }

    /// Remove every stored representation of the identifier.
    pub async fn delete(&self, id: &Identifier) -> Result<()> {
        for (path, _) in Self::candidates(id) {
            if self.blobs.has(&path).await {
                self.blobs.delete(&path).await?;
            }
        }
        Ok(())
    }

    /// Enumerate identifiers stored under a path prefix, in identifier
    /// order.
    pub async fn keys(&self, prefix: &str) -> Vec<Identifier> {
        let filter = strata_core::WalkFilter::all();
        let walked = self
            .blobs
            .walk(prefix, usize::MAX, &filter, &|_, attrs| {
                attrs.is_value && !attrs.is_hidden
            })
            .await;

        let mut ids: Vec<Identifier> = Vec::new();
        for relative in walked {
            let stem = match ValueFormat::from_path(&relative) {
                Some(_) => match relative.rsplit_once('.') {
                    Some((stem, _)) => stem.to_string(),
                    None => relative.clone(),
                },
                // Un-suffixed legacy entry: the whole name is the stem.
                None => relative.clone(),
            };
            let full = if prefix.is_empty() {
                stem
            } else {
                format!("{}/{}", prefix.trim_matches('/'), stem)
            };
            if let Ok(id) = Identifier::parse(&full) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        ids
    }

    /// Stable 128-bit content hash of a value.
    pub fn stable_hash(&self, value: &T) -> Result<u128> {
        self.codec.stable_hash(value)
    }

    /// Stable content hash as lowercase hex, for cache keys.
    pub fn content_hash(&self, value: &T) -> Result<String> {
        let bytes = ValueFormat::Binary.serialize(value)?;
        Ok(stable_hash_hex(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Dummy;

    #[test]
    fn test_candidate_order() {
        let id = Identifier::parse("a/b/thing").unwrap();
        let candidates = ValueStore::<Dummy>::candidates(&id);
        let paths: Vec<&str> = candidates.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["a/b/thing.json", "a/b/thing.yaml", "a/b/thing.yml", "a/b/thing"]
        );
        // The legacy candidate decodes with the documented default.
        assert_eq!(candidates.last().unwrap().1, LEGACY_DEFAULT_FORMAT);
    }
}
