//! Unified error types for effitrack.
//!
//! All errors are represented by [`TrackerError`], using `thiserror` for
//! ergonomic error definitions. Library code never uses `unwrap()`;
//! all fallible operations return `Result<T, TrackerError>`.
//!
//! [`TrackerError::NotFound`] is the one variant callers of the managers never
//! see: it is absorbed into default-value behaviour at the manager layer.

use thiserror::Error;

/// The unified error type for all effitrack operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A storage operation failed (I/O, network, permission or timeout).
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested key was not found in storage.
    #[error("Not found: {key}")]
    NotFound {
        /// The storage key that was not found.
        key: String,
    },

    /// Bytes were present under a key but could not be decoded.
    #[error("Corrupt data at {key}: {message}")]
    CorruptData {
        /// The storage key (or import source) holding the bad bytes.
        key: String,
        /// Description of the decode failure.
        message: String,
    },

    /// A caller-supplied record, document or identifier failed shape checks.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was missing or malformed.
        message: String,
    },

    /// An index-based mutation targeted a row that does not exist.
    #[error("Row index {index} out of range for dataset of {len} rows")]
    OutOfRange {
        /// The requested zero-based row index.
        index: usize,
        /// The number of rows in the dataset at the time of the call.
        len: usize,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// An internal error (bug).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl TrackerError {
    /// Create a storage error from a message and source error.
    pub fn storage(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error from a message only.
    pub fn storage_msg(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a corrupt-data error for the given key.
    pub fn corrupt(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::CorruptData {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if this error means the key is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
