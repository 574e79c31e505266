//! Stored connection record (`{ baseUrl, apiKey, instance }`).
//!
//! The record is owned by the surrounding application. Zapgate reads and
//! writes it only through the `ConfigStore` trait.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::credential::redact;

/// Errors from reading or writing the connection record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted gateway connection settings for one instance.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppRecord {
    #[serde(default)]
    pub base_url: String,
    /// Per-instance client key.
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected: Option<DateTime<Utc>>,
}

impl WhatsAppRecord {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            instance: instance.into(),
            last_connected: None,
        }
    }
}

impl fmt::Debug for WhatsAppRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppRecord")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("instance", &self.instance)
            .field("last_connected", &self.last_connected)
            .finish()
    }
}

/// Read/write access to the stored connection record.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the record. Returns `Ok(None)` if nothing has been stored yet.
    async fn load(&self) -> StoreResult<Option<WhatsAppRecord>>;

    /// Replace the stored record.
    async fn save(&self, record: &WhatsAppRecord) -> StoreResult<()>;
}

// ============================================================================
// File store
// ============================================================================

/// JSON file store. Writes are atomic (temp file + rename); on unix the
/// file is created with mode 0600 since it holds a credential.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> StoreResult<Option<WhatsAppRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let record = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(record))
    }

    async fn save(&self, record: &WhatsAppRecord) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(record)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&tmp_path)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, used when no persistence is wanted.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    record: Arc<Mutex<Option<WhatsAppRecord>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: WhatsAppRecord) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(record))),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> StoreResult<Option<WhatsAppRecord>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &WhatsAppRecord) -> StoreResult<()> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_missing_file_returns_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileConfigStore::new(tmp.path().join("whatsapp.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_returns_record() {
        let tmp = TempDir::new().unwrap();
        let store = FileConfigStore::new(tmp.path().join("nested/dir/whatsapp.json"));
        let record = WhatsAppRecord::new("https://gw.example.com", "client-key", "shop1");

        store.save(&record).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn record_uses_camel_case_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whatsapp.json");
        let store = FileConfigStore::new(&path);
        store
            .save(&WhatsAppRecord::new("https://gw", "k", "shop1"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"baseUrl\""));
        assert!(raw.contains("\"apiKey\""));
        assert!(!raw.contains("lastConnected"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whatsapp.json");
        FileConfigStore::new(&path)
            .save(&WhatsAppRecord::new("https://gw", "k", "shop1"))
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn corrupt_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whatsapp.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileConfigStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryConfigStore::new();
        assert!(store.load().await.unwrap().is_none());
        store
            .save(&WhatsAppRecord::new("https://gw", "k", "shop1"))
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().instance, "shop1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let record = WhatsAppRecord::new("https://gw", "very-secret-key", "shop1");
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("very-secret-key"));
        assert!(rendered.contains("shop1"));
    }
}
