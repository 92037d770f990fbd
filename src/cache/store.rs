//! Backing stores for the daily result cache.
//!
//! The cache only needs to load the whole map at startup and save it after a
//! change. `InMemoryStore` keeps entries for the process lifetime;
//! `JsonFileStore` persists them to a JSON file so a restart on the same day
//! does not spend upstream quota again.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::daily::CacheEntry;
use crate::errors::VolatilityError;

pub type CacheMap = HashMap<String, CacheEntry>;

pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<CacheMap, VolatilityError>;

    fn save(&self, entries: &CacheMap) -> Result<(), VolatilityError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<CacheMap>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for InMemoryStore {
    fn load(&self) -> Result<CacheMap, VolatilityError> {
        Ok(self.entries.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, entries: &CacheMap) -> Result<(), VolatilityError> {
        *self.entries.lock().unwrap_or_else(|p| p.into_inner()) = entries.clone();
        Ok(())
    }
}

/// Stores the cache as a single JSON object keyed by pair.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<CacheMap, VolatilityError> {
        if !self.path.exists() {
            debug!("Cache file {} not found, starting empty", self.path.display());
            return Ok(CacheMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            VolatilityError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Ok(CacheMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            VolatilityError::Storage(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &CacheMap) -> Result<(), VolatilityError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    VolatilityError::Storage(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| VolatilityError::Storage(format!("Failed to serialize cache: {}", e)))?;

        fs::write(&self.path, json).map_err(|e| {
            VolatilityError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::daily::tests::sample_entry;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("fx_volatility_{}_{}", name, std::process::id()))
            .join("cache.json")
    }

    #[test]
    fn test_in_memory_round_trip() {
        let store = InMemoryStore::new();
        assert!(store.load().unwrap().is_empty());

        let mut map = CacheMap::new();
        map.insert("EURUSD".to_string(), sample_entry("EURUSD"));
        store.save(&map).unwrap();

        assert_eq!(store.load().unwrap(), map);
    }

    #[test]
    fn test_json_file_missing_loads_empty() {
        let store = JsonFileStore::new(temp_path("missing"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_file_persists_entries() {
        let path = temp_path("persist");
        let store = JsonFileStore::new(&path);

        let mut map = CacheMap::new();
        map.insert("GBPJPY".to_string(), sample_entry("GBPJPY"));
        store.save(&map).unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.load().unwrap(), map);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_json_file_corrupt_is_storage_error() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, VolatilityError::Storage(_)));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
