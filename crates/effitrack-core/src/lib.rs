//! effitrack core types, traits, configuration, and errors.
//!
//! This crate provides the building blocks of the efficiency tracker's
//! persistence layer: the [`StorageBackend`] trait, the tabular record
//! model and its schema migrator, the JSON configuration documents, the
//! store configuration, and the unified error type.

pub mod config;
pub mod documents;
pub mod error;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::StoreConfig;
pub use documents::{ConfigDocument, Developer, TeamSettings, TeamsConfig};
pub use error::TrackerError;
pub use storage::StorageBackend;
pub use types::*;

/// Convenience Result type using [`TrackerError`].
pub type Result<T> = std::result::Result<T, TrackerError>;
