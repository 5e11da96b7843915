//! effitrack runtime: backend selection and the data managers.
//!
//! [`TrackerStore::open`] chooses remote or local storage and exposes the
//! [`DatasetManager`] for efficiency records and the [`DocumentManager`]s for
//! the team roster and per-team settings. [`stats`] computes the dashboard
//! aggregates over a loaded dataset.

pub mod dataset;
pub mod documents;
pub mod stats;
pub mod store;

pub use dataset::DatasetManager;
pub use documents::{DocumentManager, DocumentOrigin, TeamSettingsManager, TeamsConfigManager};
pub use stats::Summary;
pub use store::{select_backend, BackendKind, TrackerStore};

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Calling this more
/// than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
