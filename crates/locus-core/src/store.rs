//! Last-known-value persistence consulted by providers.
//!
//! Entries are keyed by provider id and stored as JSON values so one store
//! can back every operation kind. The controller never touches the store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{CoreError, ProviderId};

/// Key/value store of the most recent value per provider.
pub trait LastKnownStore: Send + Sync {
    fn get(&self, key: &ProviderId) -> Option<Value>;

    fn put(&self, key: ProviderId, value: Value);

    fn remove(&self, key: &ProviderId) -> Option<Value>;
}

/// Thread-safe in-memory store with optional JSON file snapshots.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<ProviderId, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot written by [`save`](Self::save). A missing file yields
    /// an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let raw = fs::read_to_string(path)?;
        let entries: BTreeMap<ProviderId, Value> = serde_json::from_str(&raw)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(entries)),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let snapshot = self.read().clone();
        let body = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, body)?;
        Ok(())
    }

    /// Typed read; entries that do not decode as `T` are treated as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &ProviderId) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn put_as<T: Serialize>(&self, key: ProviderId, value: &T) -> Result<(), CoreError> {
        self.put(key, serde_json::to_value(value)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ProviderId, Value>> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ProviderId, Value>> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl LastKnownStore for MemoryStore {
    fn get(&self, key: &ProviderId) -> Option<Value> {
        self.read().get(key).cloned()
    }

    fn put(&self, key: ProviderId, value: Value) {
        self.write().insert(key, value);
    }

    fn remove(&self, key: &ProviderId) -> Option<Value> {
        self.write().remove(key)
    }
}
