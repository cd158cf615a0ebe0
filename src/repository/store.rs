//! Key-value stores backing the persisted client state

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

/// Durable key-value storage, one JSON value per key
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> AppResult<()>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> AppResult<()>;
}

/// Store persisted as a single JSON document on disk
pub struct FileStore {
    path: PathBuf,
    document: Mutex<Map<String, Value>>,
}

impl FileStore {
    /// Open the store, starting empty when the file does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    // Unreadable state is treated like a fresh install
                    tracing::warn!("State file {} is corrupt, starting empty", path.display());
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read state file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!("Opened state file {} ({} keys)", path.display(), document.len());

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole document to a sibling file, then rename it into place
    async fn flush(&self, document: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self.document.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut document = self.document.lock().await;
        let previous = document.insert(key.to_string(), value);

        if let Err(e) = self.flush(&document).await {
            // Keep memory consistent with what is on disk
            match previous {
                Some(prev) => document.insert(key.to_string(), prev),
                None => document.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut document = self.document.lock().await;
        let Some(previous) = document.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.flush(&document).await {
            document.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

/// Volatile store; clones share the same contents
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
