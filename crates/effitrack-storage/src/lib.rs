//! Storage backend implementations and the dataset codec for effitrack.
//!
//! This crate provides concrete implementations of the
//! [`StorageBackend`](effitrack_core::StorageBackend) trait:
//!
//! - [`LocalBackend`]: filesystem-backed storage under a data directory
//! - [`S3Backend`]: S3-compatible object storage
//!
//! and [`table_codec`], which moves the efficiency dataset to and from Parquet.

pub mod local;
pub mod s3;
pub mod table_codec;

pub use local::LocalBackend;
pub use s3::S3Backend;
