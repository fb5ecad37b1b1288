//! Durable key-value storage for model scores.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

/// Key under which the score table is stored
pub const SCORES_KEY: &str = "model_scores";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Volatile store, used in tests and when no file is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> StoreResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Entries to rewrite. A corrupt file is replaced instead of blocking every
    /// later write; the flag says it must be rewritten even when nothing changed.
    async fn load_for_write(&self) -> StoreResult<(HashMap<String, String>, bool)> {
        match self.load().await {
            Ok(entries) => Ok((entries, false)),
            Err(StoreError::Corrupt(e)) => {
                tracing::warn!("Overwriting corrupt store file {}: {}", self.path.display(), e);
                Ok((HashMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let (mut entries, _) = self.load_for_write().await?;
        entries.insert(key.to_string(), value);
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        let (mut entries, corrupt) = self.load_for_write().await?;
        if entries.remove(key).is_some() || corrupt {
            self.save(&entries).await?;
        }
        Ok(())
    }
}
