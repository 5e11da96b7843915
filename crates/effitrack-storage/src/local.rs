//! Filesystem-backed storage backend.
//!
//! [`LocalBackend`] implements the [`StorageBackend`] trait using the local
//! filesystem. Every `put` writes a sibling temp file, syncs it, and renames
//! it over the target, so a crash mid-write never leaves a truncated object.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use effitrack_core::error::TrackerError;
use effitrack_core::storage::StorageBackend;
use effitrack_core::Result;

/// Suffix of in-flight temp files. Never returned by `list`.
const TMP_SUFFIX: &str = ".tmp";

/// A [`StorageBackend`] backed by the local filesystem.
///
/// All keys are mapped to paths under the configured `base_dir`.
/// Parent directories are created automatically on `put`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_dir: PathBuf,
}

impl LocalBackend {
    /// Create a new `LocalBackend` rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await.map_err(|e| {
            TrackerError::storage(
                format!("Failed to create base directory: {}", base_dir.display()),
                e,
            )
        })?;
        debug!(base_dir = %base_dir.display(), "LocalBackend initialised");
        Ok(Self { base_dir })
    }

    /// Return the full filesystem path for a storage key.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(TrackerError::validation(format!(
                "Storage key must be a relative path without '..': '{key}'"
            )));
        }
        Ok(self.base_dir.join(relative))
    }

    /// Return the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                TrackerError::storage(
                    format!(
                        "Failed to create parent directories for {}",
                        path.display()
                    ),
                    e,
                )
            })?;
        }

        let tmp_path = temp_path_for(&path);
        if let Err(e) = write_then_rename(&tmp_path, &path, &data).await {
            // Best effort: the temp file is garbage either way.
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        debug!("Put {} bytes to {}", data.len(), key);
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrackerError::NotFound {
                    key: key.to_string(),
                }
            } else {
                TrackerError::storage(format!("Failed to read {}", path.display()), e)
            }
        })?;
        debug!("Get {} bytes from {}", data.len(), key);
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = &self.base_dir;
        let mut results = Vec::new();
        list_recursive(base, base, prefix, &mut results).await?;
        results.sort();
        debug!("Listed {} keys with prefix '{}'", results.len(), prefix);
        Ok(results)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Delete {}: already absent", key);
                Ok(())
            }
            Err(e) => Err(TrackerError::storage(
                format!("Failed to delete {}", path.display()),
                e,
            )),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        let exists = fs::try_exists(&path).await.map_err(|e| {
            TrackerError::storage(format!("Failed to stat {}", path.display()), e)
        })?;
        debug!("exists {} → {}", key, exists);
        Ok(exists)
    }
}

/// `<dir>/.<file>.<uuid>.tmp` next to the target, so the rename stays on
/// one filesystem.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}{}", file_name, Uuid::new_v4(), TMP_SUFFIX))
}

/// Write data to a temp file, fsync it, then atomically rename to the final path.
async fn write_then_rename(tmp_path: &Path, final_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(tmp_path).await.map_err(|e| {
        TrackerError::storage(format!("Failed to create {}", tmp_path.display()), e)
    })?;
    file.write_all(data).await.map_err(|e| {
        TrackerError::storage(format!("Failed to write {}", tmp_path.display()), e)
    })?;
    file.sync_all().await.map_err(|e| {
        TrackerError::storage(format!("Failed to sync {}", tmp_path.display()), e)
    })?;
    drop(file);
    fs::rename(tmp_path, final_path).await.map_err(|e| {
        TrackerError::storage(format!("Failed to replace {}", final_path.display()), e)
    })?;
    Ok(())
}

/// Recursively list all files under `dir`, producing keys relative to `base`.
async fn list_recursive(
    base: &Path,
    dir: &Path,
    prefix: &str,
    results: &mut Vec<String>,
) -> Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(TrackerError::storage(
                format!("Failed to read directory {}", dir.display()),
                e,
            ))
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        TrackerError::storage(
            format!("Failed to read directory entry in {}", dir.display()),
            e,
        )
    })? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| {
            TrackerError::storage(format!("Failed to stat {}", path.display()), e)
        })?;
        if file_type.is_dir() {
            Box::pin(list_recursive(base, &path, prefix, results)).await?;
            continue;
        }
        if path.to_string_lossy().ends_with(TMP_SUFFIX) {
            continue;
        }
        let relative = path
            .strip_prefix(base)
            .map_err(|e| TrackerError::Internal {
                message: format!("Path prefix strip failed: {e}"),
            })?;
        // Forward slashes keep keys identical across platforms.
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        if key.starts_with(prefix) {
            results.push(key);
        }
    }

    Ok(())
}
