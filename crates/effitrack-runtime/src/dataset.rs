//! The efficiency-records dataset manager.
//!
//! [`DatasetManager`] owns the single tabular dataset. Every mutation is a
//! whole-object load-modify-save: read the Parquet object, normalize it,
//! change the in-memory records, write the whole object back.
//!
//! There is no locking between callers. Two concurrent mutations can race
//! and the later save wins; each save is still atomic on its own.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use effitrack_core::schema::{has_legacy_period, is_canonical, normalize_dataset};
use effitrack_core::storage::{StorageBackend, DATASET_KEY};
use effitrack_core::{
    Column, EfficiencyDataset, EfficiencyRecord, FieldUpdates, RawTable, Result, TrackerError,
};
use effitrack_storage::table_codec::{decode_table, encode_dataset};

/// Label used for error messages about imported bytes.
const IMPORT_SOURCE: &str = "import";

/// Load/append/update/delete/replace over the efficiency dataset.
#[derive(Clone)]
pub struct DatasetManager {
    storage: Arc<dyn StorageBackend>,
    key: String,
}

impl DatasetManager {
    /// Create a manager for the dataset stored at [`DATASET_KEY`].
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            key: DATASET_KEY.to_string(),
        }
    }

    /// The storage key of the dataset.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the dataset, upgraded to the current schema.
    ///
    /// An absent dataset is an empty one. Undecodable bytes fail with
    /// [`TrackerError::CorruptData`].
    pub async fn load(&self) -> Result<EfficiencyDataset> {
        let data = match self.storage.get(&self.key).await {
            Ok(data) => data,
            Err(TrackerError::NotFound { .. }) => {
                debug!(key = %self.key, "No dataset stored yet, starting empty");
                return Ok(EfficiencyDataset::new());
            }
            Err(e) => return Err(e),
        };

        let raw = decode_table(&self.key, data)?;
        log_migration(&self.key, &raw);
        let dataset = normalize_dataset(raw);
        debug!(key = %self.key, rows = dataset.len(), "Loaded dataset");
        Ok(dataset)
    }

    /// Load for display: any failure reads as an empty dataset.
    ///
    /// Mutations never go through this path.
    pub async fn load_or_empty(&self) -> EfficiencyDataset {
        match self.load().await {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to load dataset, showing no data");
                EfficiencyDataset::new()
            }
        }
    }

    /// Append one record after validating its identifying fields.
    pub async fn append(&self, record: EfficiencyRecord) -> Result<()> {
        record.validate()?;
        let mut dataset = self.load().await?;
        dataset.push(record);
        self.save(&dataset).await?;
        info!(key = %self.key, rows = dataset.len(), "Appended record");
        Ok(())
    }

    /// Merge `fields` into the record at `index` and save.
    ///
    /// Returns the updated record.
    pub async fn update_at(&self, index: usize, fields: &FieldUpdates) -> Result<EfficiencyRecord> {
        let mut dataset = self.load().await?;
        let len = dataset.len();
        let record = dataset
            .get_mut(index)
            .ok_or(TrackerError::OutOfRange { index, len })?;
        record.merge(fields);
        record.validate()?;
        let updated = record.clone();
        self.save(&dataset).await?;
        info!(key = %self.key, index, fields = fields.len(), "Updated record");
        Ok(updated)
    }

    /// Remove the record at `index` and save. Returns the removed record.
    pub async fn delete_at(&self, index: usize) -> Result<EfficiencyRecord> {
        let mut dataset = self.load().await?;
        let removed = dataset.remove(index)?;
        self.save(&dataset).await?;
        info!(key = %self.key, index, rows = dataset.len(), "Deleted record");
        Ok(removed)
    }

    /// Overwrite the whole dataset.
    pub async fn replace_all(&self, dataset: EfficiencyDataset) -> Result<()> {
        self.save(&dataset).await?;
        info!(key = %self.key, rows = dataset.len(), "Replaced dataset");
        Ok(())
    }

    /// Normalize a raw table of any vintage and overwrite the dataset with it.
    pub async fn replace_all_raw(&self, table: RawTable) -> Result<usize> {
        log_migration(IMPORT_SOURCE, &table);
        let dataset = normalize_dataset(table);
        let rows = dataset.len();
        self.replace_all(dataset).await?;
        Ok(rows)
    }

    /// Import a Parquet file, replacing the dataset. Returns the row count.
    ///
    /// Undecodable input fails before anything is written.
    pub async fn import(&self, data: Bytes) -> Result<usize> {
        let table = decode_table(IMPORT_SOURCE, data)?;
        self.replace_all_raw(table).await
    }

    /// The current dataset as normalized Parquet bytes.
    pub async fn export(&self) -> Result<Bytes> {
        let dataset = self.load().await?;
        encode_dataset(&dataset)
    }

    /// Number of stored records.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Records logged by one team.
    pub async fn records_for_team(&self, team: &str) -> Result<EfficiencyDataset> {
        Ok(self.load().await?.filter_by(Column::TeamName, team))
    }

    /// Records logged by one developer.
    pub async fn records_for_developer(&self, developer: &str) -> Result<EfficiencyDataset> {
        Ok(self.load().await?.filter_by(Column::DeveloperName, developer))
    }

    async fn save(&self, dataset: &EfficiencyDataset) -> Result<()> {
        let data = encode_dataset(dataset)?;
        debug!(key = %self.key, rows = dataset.len(), bytes = data.len(), "Saving dataset");
        self.storage.put(&self.key, data).await
    }
}

fn log_migration(source: &str, raw: &RawTable) {
    if is_canonical(raw) {
        return;
    }
    if has_legacy_period(raw) {
        info!(source, rows = raw.row_count(), "Migrating legacy weekly records to period start/end");
    } else {
        debug!(source, columns = ?raw.column_names(), "Normalizing dataset columns");
    }
}
