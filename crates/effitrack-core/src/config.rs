//! Store configuration handed in by the host process.
//!
//! [`StoreConfig`] is built once by whoever owns the environment (web server,
//! test harness) and passed to the store factory. This crate never reads
//! environment variables itself.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::Result;

/// Default bucket name for remote storage.
pub const DEFAULT_BUCKET: &str = "efficiency-tracker-data";

/// Default region for remote storage.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default local data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default per-request timeout for remote calls: 30 seconds.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout for remote calls: 5 seconds.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the persistence layer.
///
/// The password and credentials deserialize but are never serialized.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Select the remote (object storage) backend instead of the local one.
    pub use_remote: bool,

    /// Bucket holding all objects when `use_remote` is set.
    pub bucket_name: String,

    /// Region of the bucket.
    pub region_name: String,

    /// Root directory of the local backend. Also the fallback location when
    /// the remote backend cannot be reached.
    pub data_directory: PathBuf,

    /// Admin password. Consumed by the admin UI, never by this layer.
    #[serde(skip_serializing)]
    pub admin_password: String,

    /// Custom S3-compatible endpoint (MinIO, Ceph). Enables plain HTTP.
    pub endpoint: Option<String>,

    /// Optional path prefix for every object inside the bucket.
    pub object_prefix: String,

    /// Explicit access key. Falls back to the AWS environment chain when unset.
    #[serde(skip_serializing)]
    pub access_key_id: Option<String>,

    /// Explicit secret key, paired with `access_key_id`.
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,

    /// Timeout applied to each remote request. Elapsed timeouts are errors.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Timeout for establishing a remote connection.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            use_remote: false,
            bucket_name: DEFAULT_BUCKET.to_string(),
            region_name: DEFAULT_REGION.to_string(),
            data_directory: PathBuf::from(DEFAULT_DATA_DIR),
            admin_password: String::new(),
            endpoint: None,
            object_prefix: String::new(),
            access_key_id: None,
            secret_access_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// A local-only configuration rooted at `data_directory`.
    pub fn local(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            ..Self::default()
        }
    }

    /// A remote configuration for the given bucket and region. The local
    /// data directory keeps its default and serves as the fallback root.
    pub fn remote(bucket_name: impl Into<String>, region_name: impl Into<String>) -> Self {
        Self {
            use_remote: true,
            bucket_name: bucket_name.into(),
            region_name: region_name.into(),
            ..Self::default()
        }
    }

    /// Check the remote settings for obvious mistakes.
    ///
    /// Only meaningful when `use_remote` is set; a local configuration is
    /// always valid here (directory creation errors surface later).
    pub fn validate(&self) -> Result<()> {
        if !self.use_remote {
            return Ok(());
        }
        if self.bucket_name.trim().is_empty() {
            return Err(TrackerError::Config {
                message: "Remote storage requires a bucket name".to_string(),
            });
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(TrackerError::Config {
                message: "access_key_id and secret_access_key must be set together".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(TrackerError::Config {
                message: "request_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("use_remote", &self.use_remote)
            .field("bucket_name", &self.bucket_name)
            .field("region_name", &self.region_name)
            .field("data_directory", &self.data_directory)
            .field("endpoint", &self.endpoint)
            .field("object_prefix", &self.object_prefix)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "***"))
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "invalid duration in seconds: {secs}"
            )));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_local() {
        let config = StoreConfig::default();
        assert!(!config.use_remote);
        assert_eq!(config.bucket_name, DEFAULT_BUCKET);
        assert_eq!(config.region_name, DEFAULT_REGION);
        assert_eq!(config.data_directory, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_requires_bucket() {
        let config = StoreConfig::remote("", "eu-west-1");
        assert!(matches!(
            config.validate(),
            Err(TrackerError::Config { .. })
        ));

        let config = StoreConfig::remote("tracker", "eu-west-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remote_requires_paired_credentials() {
        let mut config = StoreConfig::remote("tracker", "eu-west-1");
        config.access_key_id = Some("AKIA".into());
        assert!(config.validate().is_err());
        config.secret_access_key = Some("secret".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = StoreConfig::remote("tracker", "eu-west-1");
        config.admin_password = "hunter2".into();
        config.access_key_id = Some("AKIAEXAMPLE".into());
        config.secret_access_key = Some("topsecret".into());
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("AKIAEXAMPLE"));
        assert!(!printed.contains("topsecret"));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = StoreConfig::local("/tmp/tracker");
        config.request_timeout = Duration::from_millis(1500);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: StoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_serialization_omits_secrets() {
        let mut config = StoreConfig::remote("tracker", "eu-west-1");
        config.admin_password = "hunter2".into();
        config.access_key_id = Some("AKIAEXAMPLE".into());
        config.secret_access_key = Some("topsecret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("AKIAEXAMPLE"));
        assert!(!json.contains("topsecret"));

        // Secrets still load from a config file.
        let loaded: StoreConfig = serde_json::from_str(
            r#"{"admin_password": "pw", "access_key_id": "id", "secret_access_key": "sk"}"#,
        )
        .unwrap();
        assert_eq!(loaded.admin_password, "pw");
        assert_eq!(loaded.secret_access_key.as_deref(), Some("sk"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"use_remote": true, "bucket_name": "b"}"#).unwrap();
        assert!(config.use_remote);
        assert_eq!(config.region_name, DEFAULT_REGION);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }
}
