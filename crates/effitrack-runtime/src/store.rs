//! Backend selection and the store handle.
//!
//! [`select_backend`] picks remote or local storage at startup. When remote
//! storage is configured but cannot be built or reached, it falls back to
//! the local directory and says so in the log. [`TrackerStore`] bundles the
//! chosen backend with the managers built on top of it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use effitrack_core::config::StoreConfig;
use effitrack_core::error::TrackerError;
use effitrack_core::storage::{
    team_from_settings_key, StorageBackend, TEAM_SETTINGS_PREFIX,
};
use effitrack_core::Result;
use effitrack_storage::local::LocalBackend;
use effitrack_storage::s3::S3Backend;

use crate::dataset::DatasetManager;
use crate::documents::{TeamSettingsManager, TeamsConfigManager};

/// Which backend a store ended up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// Choose the storage backend for `config`.
///
/// With `use_remote` set, the S3 client is built and probed with one bucket
/// listing ([`S3Backend::probe`]). Any failure there is logged at warn and the local
/// backend is used instead. Local failures (for example an uncreatable data
/// directory) are returned as errors.
pub async fn select_backend(
    config: &StoreConfig,
) -> Result<(Arc<dyn StorageBackend>, BackendKind)> {
    if config.use_remote {
        match connect_remote(config).await {
            Ok(backend) => {
                info!(bucket = %backend.bucket(), region = %config.region_name, "Using remote storage");
                return Ok((Arc::new(backend), BackendKind::Remote));
            }
            Err(e) => {
                warn!(
                    bucket = %config.bucket_name,
                    error = %e,
                    "Remote storage unavailable, falling back to local storage"
                );
            }
        }
    }

    let dir = expand_home(&config.data_directory)?;
    let backend = LocalBackend::new(&dir).await?;
    info!(data_directory = %dir.display(), "Using local storage");
    Ok((Arc::new(backend), BackendKind::Local))
}

async fn connect_remote(config: &StoreConfig) -> Result<S3Backend> {
    let backend = S3Backend::new(config)?;
    backend.probe().await?;
    Ok(backend)
}

/// The persistence layer handle: one backend plus its managers.
///
/// Build it once at startup and share it; the managers are cheap to clone.
pub struct TrackerStore {
    config: StoreConfig,
    storage: Arc<dyn StorageBackend>,
    kind: BackendKind,
    dataset: DatasetManager,
    teams: TeamsConfigManager,
}

impl TrackerStore {
    /// Select a backend for `config` and build the managers on it.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let (storage, kind) = select_backend(&config).await?;
        Ok(Self::with_backend(config, storage, kind))
    }

    /// Build a store on an already chosen backend.
    pub fn with_backend(
        config: StoreConfig,
        storage: Arc<dyn StorageBackend>,
        kind: BackendKind,
    ) -> Self {
        Self {
            dataset: DatasetManager::new(Arc::clone(&storage)),
            teams: TeamsConfigManager::roster(Arc::clone(&storage)),
            config,
            storage,
            kind,
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }

    pub fn dataset(&self) -> &DatasetManager {
        &self.dataset
    }

    pub fn teams(&self) -> &TeamsConfigManager {
        &self.teams
    }

    /// Settings manager for one team.
    pub fn team_settings(&self, team: &str) -> Result<TeamSettingsManager> {
        TeamSettingsManager::for_team(Arc::clone(&self.storage), team)
    }

    /// Team ids that have a stored settings document.
    pub async fn settings_teams(&self) -> Result<Vec<String>> {
        let keys = self.storage.list(TEAM_SETTINGS_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|key| team_from_settings_key(key))
            .collect())
    }

    /// Run backend selection again with the current configuration.
    ///
    /// Used after remote storage comes back, or after a config change.
    pub async fn reset(&mut self) -> Result<BackendKind> {
        let (storage, kind) = select_backend(&self.config).await?;
        if kind != self.kind {
            info!(from = %self.kind, to = %kind, "Storage backend changed");
        }
        *self = Self::with_backend(self.config.clone(), storage, kind);
        Ok(kind)
    }
}

/// Expand a leading `~` in the data directory.
fn expand_home(path: &Path) -> Result<PathBuf> {
    let Some(raw) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => {
            let home = home_dir().ok_or_else(|| TrackerError::Config {
                message: "Cannot determine home directory".to_string(),
            })?;
            Ok(home.join(rest))
        }
        None => Ok(path.to_path_buf()),
    }
}

/// Best-effort home directory detection.
fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
