//! Session persistence: a small key-value surface and typed helpers on top.
//!
//! Values are opaque JSON. The store persists three keys: the last root
//! handle, the last open file handle, and the collapsed-path set.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

pub const ROOT_KEY: &str = "root_handle";
pub const LAST_FILE_KEY: &str = "last_open_file";
pub const COLLAPSED_KEY: &str = "collapsed_paths";

/// Key-value persistence consumed by the store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// All keys in one JSON object on disk, loaded on first use.
pub struct JsonFileStore {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<Map<String, Value>>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.as_ref().and_then(|map| map.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut map = match cache.take() {
            Some(map) => map,
            None => self.read_file().await?,
        };
        map.insert(key.to_string(), value);
        let written = self.write_file(&map).await;
        *cache = Some(map);
        written
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut map = match cache.take() {
            Some(map) => map,
            None => self.read_file().await?,
        };
        map.remove(key);
        let written = self.write_file(&map).await;
        *cache = Some(map);
        written
    }
}

/// Volatile store for tests and sessions that should not persist.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: parking_lot::Mutex<HashMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// Typed, best-effort view over a [`KeyValueStore`].
///
/// Persistence failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct Session {
    kv: Arc<dyn KeyValueStore>,
}

impl Session {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.kv.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read session value");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable session value");
                None
            }
        }
    }

    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let encoded = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode session value");
                return;
            }
        };
        if let Err(e) = self.kv.set(key, encoded).await {
            tracing::warn!(key, error = %e, "failed to persist session value");
        }
    }

    pub async fn clear(&self, key: &str) {
        if let Err(e) = self.kv.remove(key).await {
            tracing::warn!(key, error = %e, "failed to clear session value");
        }
    }

    pub async fn load_collapsed(&self) -> BTreeSet<String> {
        self.load(COLLAPSED_KEY).await.unwrap_or_default()
    }

    pub async fn save_collapsed(&self, collapsed: &BTreeSet<String>) {
        self.save(COLLAPSED_KEY, collapsed).await;
    }
}
