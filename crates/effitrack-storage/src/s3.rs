//! S3-compatible object storage backend.
//!
//! [`S3Backend`] implements the [`StorageBackend`] trait using the `object_store`
//! crate, supporting any S3-compatible endpoint: AWS S3, MinIO, Ceph, etc.
//!
//! The client is built with request and connect timeouts and with retries
//! disabled: a failed call surfaces immediately and retry policy belongs to
//! the caller.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload, RetryConfig};
use tracing::{debug, instrument};

use effitrack_core::config::StoreConfig;
use effitrack_core::error::TrackerError;
use effitrack_core::storage::StorageBackend;
use effitrack_core::Result;

/// A [`StorageBackend`] backed by any S3-compatible object storage.
pub struct S3Backend {
    store: Box<dyn ObjectStore>,
    bucket: String,
    prefix: String,
}

impl S3Backend {
    /// Create a new `S3Backend` from the remote settings of a [`StoreConfig`].
    ///
    /// Building the client performs no network I/O; an unreachable bucket
    /// is only discovered on the first request.
    ///
    /// Credentials come from `access_key_id`/`secret_access_key` when set,
    /// otherwise from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the
    /// rest of the AWS environment.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let bucket = config.bucket_name.trim().to_string();

        let client_options = ClientOptions::new()
            .with_timeout(config.request_timeout)
            .with_connect_timeout(config.connect_timeout);
        let retry = RetryConfig {
            max_retries: 0,
            retry_timeout: Duration::ZERO,
            ..RetryConfig::default()
        };

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&bucket)
            .with_region(&config.region_name)
            .with_client_options(client_options)
            .with_retry(retry);

        // Custom endpoint for MinIO / S3-compatible services
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder
                .with_access_key_id(key_id)
                .with_secret_access_key(secret);
        }

        let store = builder.build().map_err(|e| {
            TrackerError::storage(format!("Failed to create S3 client for bucket {bucket}"), e)
        })?;

        let prefix = config.object_prefix.trim_matches('/').to_string();
        debug!(bucket = %bucket, prefix = %prefix, region = %config.region_name, "S3Backend initialised");

        Ok(Self {
            store: Box::new(store),
            bucket,
            prefix,
        })
    }

    /// The bucket this backend writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Check that the bucket exists and answers.
    ///
    /// Lists the object prefix. A HEAD 404 cannot tell a missing key from a
    /// missing bucket; a list against a missing bucket always fails.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn probe(&self) -> Result<()> {
        let root = (!self.prefix.is_empty()).then(|| ObjectPath::from(self.prefix.as_str()));
        self.store
            .list_with_delimiter(root.as_ref())
            .await
            .map_err(|e| {
                TrackerError::storage(format!("S3 bucket {} is not reachable", self.bucket), e)
            })?;
        Ok(())
    }

    /// Build the full object path from a key.
    fn full_path(&self, key: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, key))
        }
    }

    /// Strip the backend prefix to return keys relative to the storage root.
    fn relative_key(&self, full_key: String) -> String {
        if self.prefix.is_empty() {
            return full_key;
        }
        match full_key.strip_prefix(&format!("{}/", self.prefix)) {
            Some(key) => key.to_string(),
            None => full_key,
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.full_path(key);
        self.store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| TrackerError::storage(format!("S3 put failed for {key}"), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.full_path(key);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => TrackerError::NotFound {
                key: key.to_string(),
            },
            other => TrackerError::storage(format!("S3 get failed for {key}"), other),
        })?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| TrackerError::storage(format!("S3 get bytes failed for {key}"), e))?;
        Ok(bytes)
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // object_store lists by path segment; filter the tail ourselves so
        // partial-segment prefixes behave like the local backend.
        let (dir, _) = prefix.rsplit_once('/').unwrap_or(("", prefix));
        let list_root = if dir.is_empty() && self.prefix.is_empty() {
            None
        } else if dir.is_empty() {
            Some(ObjectPath::from(self.prefix.as_str()))
        } else {
            Some(self.full_path(dir))
        };

        let mut results = Vec::new();
        let mut stream = self.store.list(list_root.as_ref());

        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| TrackerError::storage(format!("S3 list failed for prefix {prefix}"), e))?
        {
            let key = self.relative_key(meta.location.to_string());
            if key.starts_with(prefix) {
                results.push(key);
            }
        }

        results.sort();
        Ok(results)
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.full_path(key);
        // Idempotent: deleting a missing key is not an error
        self.store
            .delete(&path)
            .await
            .map_err(|e| TrackerError::storage(format!("S3 delete failed for {key}"), e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.full_path(key);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(TrackerError::storage(format!("S3 head failed for {key}"), e)),
        }
    }
}
