//! The StorageBackend trait: the single interface for all persistence.
//!
//! Every byte the tracker keeps goes through this trait. Implementations
//! include `LocalBackend` (filesystem) and `S3Backend` (any S3-compatible
//! endpoint) in the `effitrack-storage` crate. Managers never touch the
//! filesystem or object storage directly.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// A byte-blob store keyed by logical name.
///
/// Implementations must be `Send + Sync`: one backend handle is shared by
/// every manager for the lifetime of the process.
///
/// # Concurrency
///
/// There is no locking and no conditional write. Two concurrent
/// load-modify-save sequences against the same key can lose an update; the
/// last `put` wins. Each individual `put` is whole-object, so readers never
/// observe a half-written value.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object. Overwrites if it already exists.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read an object. Returns [`TrackerError::NotFound`](crate::TrackerError::NotFound)
    /// if the key does not exist.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// List all object keys matching the given prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete an object. Does not error if the key does not exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if an object exists at the given key.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Storage key of the efficiency-records dataset.
pub const DATASET_KEY: &str = "efficiency_data.parquet";

/// Storage key of the team roster document.
pub const TEAMS_CONFIG_KEY: &str = "teams_config.json";

/// Prefix under which per-team settings documents live.
pub const TEAM_SETTINGS_PREFIX: &str = "team_settings/";

/// Return the storage key of a team's settings document.
///
/// The team identifier must already be validated with
/// [`validate_team_id`]. It is escaped with [`encode_team_id`], so distinct
/// identifiers always get distinct keys.
pub fn team_settings_key(team: &str) -> String {
    format!("{}{}.json", TEAM_SETTINGS_PREFIX, encode_team_id(team))
}

/// Recover the team identifier from a team settings key, if it is one.
pub fn team_from_settings_key(key: &str) -> Option<String> {
    let encoded = key.strip_prefix(TEAM_SETTINGS_PREFIX)?.strip_suffix(".json")?;
    if encoded.is_empty() || encoded.contains('/') {
        return None;
    }
    decode_team_id(encoded)
}

/// Escape a team identifier into a single key segment.
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (uppercase hex). The output is safe as a file name and as an S3 path
/// segment without further escaping.
pub fn encode_team_id(team: &str) -> String {
    let mut out = String::with_capacity(team.len());
    for byte in team.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_team_id`]. Returns `None` for malformed input.
pub fn decode_team_id(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                let hex = encoded.get(i + 1..i + 3)?;
                if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// Reject team identifiers that are empty or could escape the key namespace.
pub fn validate_team_id(team: &str) -> Result<()> {
    let trimmed = team.trim();
    if trimmed.is_empty() {
        return Err(crate::TrackerError::validation("Team name must not be empty"));
    }
    if trimmed.contains("..")
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
    {
        return Err(crate::TrackerError::validation(format!(
            "Team name contains invalid characters (path separators or '..'): '{team}'"
        )));
    }
    Ok(())
}
