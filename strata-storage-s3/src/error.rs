//! Error types for the S3 storage driver

use thiserror::Error;

/// Errors from S3 driver operations
#[derive(Debug, Error)]
pub enum S3SourceError {
    /// I/O or network error
    #[error("I/O error: {0}")]
    Io(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Forbidden - insufficient permissions
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing region configuration
    #[error("Missing AWS region configuration")]
    MissingRegion,

    /// Operation the backend cannot support
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// S3 SDK error
    #[error("S3 error: {0}")]
    S3(String),
}

impl S3SourceError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn s3(msg: impl Into<String>) -> Self {
        Self::S3(msg.into())
    }
}

/// Result type for S3 driver operations
pub type Result<T> = std::result::Result<T, S3SourceError>;

// Convert to strata-core errors
impl From<S3SourceError> for strata_core::Error {
    fn from(err: S3SourceError) -> Self {
        match err {
            S3SourceError::NotFound(msg) => strata_core::Error::not_found(msg),
            S3SourceError::Io(msg) => strata_core::Error::io(msg),
            _ => strata_core::Error::storage(err.to_string()),
        }
    }
}
