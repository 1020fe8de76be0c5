//! Error types for acache

use std::io;
use thiserror::Error;

/// Result type for acache operations
pub type Result<T> = std::result::Result<T, AcacheError>;

/// Errors that can occur in acache
#[derive(Debug, Error)]
pub enum AcacheError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Upstream unreachable or answered with a non-success status
    #[error("Fetch failed for {url}: {reason}")]
    Fetch {
        /// Upstream URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Response body could not be fully drained
    #[error("Failed reading response body: {0}")]
    Read(String),

    /// Encoded response bytes do not match the expected layout
    #[error("Invalid response encoding: {0}")]
    Format(String),

    /// Stored route record could not be decoded
    #[error("Corrupt route under key {key}: {source}")]
    Decode {
        /// Storage key of the corrupt entry
        key: String,
        /// Underlying decode error
        source: serde_json::Error,
    },

    /// Route record could not be encoded
    #[error("Failed encoding route: {0}")]
    Encode(#[from] serde_json::Error),

    /// Store used before its bucket was created
    #[error("Bucket '{0}' does not exist. Have you run 'acache init' yet?")]
    NoBucket(String),

    /// Bucket created twice
    #[error("Bucket '{0}' already exists")]
    AlreadyExists(String),

    /// Storage engine error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Alias cannot be used as a replay path
    #[error("Invalid alias '{0}'")]
    InvalidAlias(String),

    /// Route is missing a required field
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Store lock poisoned by a panicking holder
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl AcacheError {
    /// Short label naming the stage that produced the error
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Read(_) | Self::DataTooLarge { .. } => "read",
            Self::Format(_) | Self::Decode { .. } | Self::Encode(_) => "decode",
            Self::NoBucket(_)
            | Self::AlreadyExists(_)
            | Self::Storage(_)
            | Self::InvalidRoute(_)
            | Self::LockPoisoned => "store",
            Self::InvalidAlias(_) => "alias",
            Self::ConfigError(_) => "config",
            Self::Io(_) | Self::Other(_) => "io",
        }
    }
}
