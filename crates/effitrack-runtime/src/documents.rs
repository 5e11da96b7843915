//! Managers for the JSON configuration documents.
//!
//! A [`DocumentManager`] reads and writes one document as a whole object.
//! A document that has never been saved reads as its default.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use effitrack_core::storage::{
    team_settings_key, validate_team_id, StorageBackend, TEAMS_CONFIG_KEY,
};
use effitrack_core::{ConfigDocument, Result, TeamSettings, TeamsConfig, TrackerError};

/// Where a loaded document came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Parsed from storage.
    Stored,
    /// Nothing was stored; the default document was returned.
    Default,
}

/// Load/save/ensure-defaults over one JSON document.
pub struct DocumentManager<D> {
    storage: Arc<dyn StorageBackend>,
    key: String,
    _document: PhantomData<fn() -> D>,
}

/// Manager for the team roster.
pub type TeamsConfigManager = DocumentManager<TeamsConfig>;

/// Manager for one team's settings.
pub type TeamSettingsManager = DocumentManager<TeamSettings>;

impl<D> Clone for DocumentManager<D> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            key: self.key.clone(),
            _document: PhantomData,
        }
    }
}

impl<D: ConfigDocument> DocumentManager<D> {
    /// Create a manager for the document stored at `key`.
    pub fn new(storage: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            _document: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the document, or its default if nothing is stored.
    pub async fn load(&self) -> Result<D> {
        Ok(self.load_with_origin().await?.0)
    }

    /// Load the document and report whether it was stored or defaulted.
    ///
    /// Unparseable JSON fails with [`TrackerError::CorruptData`]; it is never
    /// replaced by the default.
    pub async fn load_with_origin(&self) -> Result<(D, DocumentOrigin)> {
        let data = match self.storage.get(&self.key).await {
            Ok(data) => data,
            Err(TrackerError::NotFound { .. }) => {
                debug!(key = %self.key, kind = D::KIND, "No document stored, using defaults");
                return Ok((D::default_document(), DocumentOrigin::Default));
            }
            Err(e) => return Err(e),
        };

        let document: D = serde_json::from_slice(&data)
            .map_err(|e| TrackerError::corrupt(&self.key, format!("invalid {}: {e}", D::KIND)))?;
        debug!(key = %self.key, kind = D::KIND, "Loaded document");
        Ok((document.after_load(), DocumentOrigin::Stored))
    }

    /// Overwrite the stored document.
    pub async fn save(&self, document: &D) -> Result<()> {
        let json = serde_json::to_vec_pretty(document).map_err(|e| TrackerError::Internal {
            message: format!("Failed to serialize {}: {e}", D::KIND),
        })?;
        self.storage.put(&self.key, Bytes::from(json)).await?;
        info!(key = %self.key, kind = D::KIND, "Saved document");
        Ok(())
    }

    /// Load the document, writing the default first if nothing is stored.
    ///
    /// After this returns, a plain `get` of the key succeeds.
    pub async fn ensure_defaults(&self) -> Result<D> {
        let (document, origin) = self.load_with_origin().await?;
        if origin == DocumentOrigin::Default {
            self.save(&document).await?;
            info!(key = %self.key, kind = D::KIND, "Wrote default document");
        }
        Ok(document)
    }

    /// Load, apply `edit`, and save. Nothing is written if `edit` fails.
    pub async fn update<F>(&self, edit: F) -> Result<D>
    where
        F: FnOnce(&mut D) -> Result<()>,
    {
        let mut document = self.load().await?;
        edit(&mut document)?;
        self.save(&document).await?;
        Ok(document)
    }
}

impl DocumentManager<TeamsConfig> {
    /// Manager for the roster at [`TEAMS_CONFIG_KEY`].
    pub fn roster(storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(storage, TEAMS_CONFIG_KEY)
    }
}

impl DocumentManager<TeamSettings> {
    /// Manager for the settings of `team`.
    pub fn for_team(storage: Arc<dyn StorageBackend>, team: &str) -> Result<Self> {
        validate_team_id(team)?;
        Ok(Self::new(storage, team_settings_key(team)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effitrack_core::Developer;
    use effitrack_storage::LocalBackend;
    use tempfile::TempDir;

    async fn test_storage() -> (Arc<dyn StorageBackend>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalBackend::new(tmp.path()).await.unwrap());
        (storage, tmp)
    }

    #[tokio::test]
    async fn test_absent_document_is_default() {
        let (storage, _tmp) = test_storage().await;
        let manager = TeamsConfigManager::roster(storage.clone());
        let (config, origin) = manager.load_with_origin().await.unwrap();
        assert!(config.is_empty());
        assert_eq!(origin, DocumentOrigin::Default);
        assert!(!storage.exists(TEAMS_CONFIG_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_defaults_writes_once() {
        let (storage, _tmp) = test_storage().await;
        let manager = TeamSettingsManager::for_team(storage.clone(), "QA Team").unwrap();
        assert_eq!(manager.key(), "team_settings/QA_20Team.json");

        let settings = manager.ensure_defaults().await.unwrap();
        assert_eq!(settings, TeamSettings::default());
        assert!(storage.get("team_settings/QA_20Team.json").await.is_ok());

        let mut custom = settings.clone();
        custom.categories = vec!["Spikes".to_string()];
        manager.save(&custom).await.unwrap();
        // A stored document is left alone.
        assert_eq!(manager.ensure_defaults().await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_error() {
        let (storage, _tmp) = test_storage().await;
        storage
            .put(TEAMS_CONFIG_KEY, Bytes::from("{not json"))
            .await
            .unwrap();
        let manager = TeamsConfigManager::roster(storage.clone());
        assert!(matches!(
            manager.load().await,
            Err(TrackerError::CorruptData { .. })
        ));
        // ensure_defaults must not paper over a corrupt document.
        assert!(manager.ensure_defaults().await.is_err());
        assert_eq!(
            storage.get(TEAMS_CONFIG_KEY).await.unwrap(),
            Bytes::from("{not json")
        );
    }

    #[tokio::test]
    async fn test_update_applies_edit() {
        let (storage, _tmp) = test_storage().await;
        let manager = TeamsConfigManager::roster(storage);
        manager
            .update(|config| config.add_developer("Data Team", Developer::new("Eve")))
            .await
            .unwrap();
        let failed = manager
            .update(|config| config.add_developer("../x", Developer::new("Mallory")))
            .await;
        assert!(failed.is_err());

        let config = manager.load().await.unwrap();
        assert_eq!(config.team_names().collect::<Vec<_>>(), vec!["Data Team"]);
    }

    #[tokio::test]
    async fn test_for_team_rejects_path_segments() {
        let (storage, _tmp) = test_storage().await;
        assert!(TeamSettingsManager::for_team(storage.clone(), "a/b").is_err());
        assert!(TeamSettingsManager::for_team(storage, "").is_err());
    }
}
