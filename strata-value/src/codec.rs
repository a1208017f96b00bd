//! The format-negotiating value codec.
//!
//! [`ValueCodec`] pairs a default format with the decode pipeline: byte
//! pre-processors, the tombstone check, and typed decode middlewares with
//! single-recovery fallback. It also produces the stable content hash of
//! a value via the binary codec.

use crate::format::ValueFormat;
use crate::pipeline::{BytePreprocessor, DecodeMiddleware};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use strata_core::{stable_hash, Error, Identifier, Result};

/// Serializer/deserializer for one value type, with a pluggable decode
/// pipeline.
pub struct ValueCodec<T> {
    default_format: ValueFormat,
    preprocessors: Vec<Arc<dyn BytePreprocessor>>,
    middlewares: Vec<Arc<dyn DecodeMiddleware<T>>>,
}

impl<T> ValueCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Codec with the default format and an empty pipeline.
    pub fn new() -> Self {
        Self {
            default_format: ValueFormat::default(),
            preprocessors: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// Override the default serialization format.
    pub fn with_default_format(mut self, format: ValueFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Append a byte pre-processor (registration order is execution order).
    pub fn with_preprocessor(mut self, pre: Arc<dyn BytePreprocessor>) -> Self {
        self.preprocessors.push(pre);
        self
    }

    /// Append a decode middleware (registration order is execution order).
    pub fn with_middleware(mut self, middleware: Arc<dyn DecodeMiddleware<T>>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// The default serialization format.
    pub fn default_format(&self) -> ValueFormat {
        self.default_format
    }

    /// Serialize a value in the given format.
    pub fn encode(&self, value: &T, format: ValueFormat) -> Result<Vec<u8>> {
        format.serialize(value)
    }

    /// Serialize a value in the default format.
    pub fn encode_default(&self, value: &T) -> Result<Vec<u8>> {
        self.encode(value, self.default_format)
    }

    /// Run the full decode pipeline.
    ///
    /// Returns `Ok(None)` for an explicit-null tombstone payload. If a
    /// middleware fails, the single registered recovery middleware is
    /// invoked; when recovery also fails, the original error propagates
    /// with the recovery failure recorded.
    pub async fn decode(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
    ) -> Result<Option<T>> {
        let mut bytes = bytes.to_vec();
        if format.is_text() {
            for pre in &self.preprocessors {
                bytes = pre.process(id, bytes)?;
            }
        }

        if format.is_null_payload(&bytes) {
            return Ok(None);
        }

        if self.middlewares.is_empty() {
            return Ok(Some(format.deserialize(&bytes)?));
        }

        let mut current: Option<T> = None;
        for middleware in &self.middlewares {
            match middleware.decode(id, format, &bytes, current.take()).await {
                Ok(value) => current = value,
                Err(original) => return self.try_recover(id, format, &bytes, original).await,
            }
        }
        Ok(current)
    }

    async fn try_recover(
        &self,
        id: &Identifier,
        format: ValueFormat,
        bytes: &[u8],
        original: Error,
    ) -> Result<Option<T>> {
        match self.middlewares.iter().find(|m| m.supports_recovery()) {
            Some(recovery) => match recovery.recover(id, format, bytes).await {
                Ok(value) => Ok(value),
                Err(recovery_err) => Err(Error::decode_with_recovery(original, recovery_err)),
            },
            None => Err(original),
        }
    }

    /// Stable 128-bit content hash of a value.
    ///
    /// Hashes the binary serialization, which is deterministic across
    /// process runs for semantically identical values.
    pub fn stable_hash(&self, value: &T) -> Result<u128> {
        let bytes = ValueFormat::Binary.serialize(value)?;
        Ok(stable_hash(&bytes))
    }
}

impl<T> Default for ValueCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
