//! Key-value store persisted as a single JSON file

use super::{check_quota, prefixed_sizes, used_bytes, KeyValueStore};
use crate::error::StoreError;
use crate::types::StorageUsage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Whole key space kept in memory and mirrored to one JSON object on disk
///
/// Each mutation is written to a sibling temporary file and renamed over the
/// original; if that fails the in-memory map is rolled back so memory and disk
/// agree.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    capacity: Option<u64>,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>, capacity: Option<u64>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let data = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = ?path, keys = data.len(), "Opened file store");

        Ok(Self {
            path,
            capacity,
            data: Mutex::new(data),
        })
    }

    fn data(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_vec(data)
            .map_err(|e| StoreError::Corrupt(format!("serialize store: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = ?self.path, bytes = json.len(), "Persisted file store");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data();
        check_quota(&data, self.capacity, key, value)?;

        let previous = data.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&data) {
            match previous {
                Some(old) => data.insert(key.to_string(), old),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self.data();
        let Some(previous) = data.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&data) {
            data.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.data().keys().cloned().collect())
    }

    fn usage(&self) -> StorageUsage {
        StorageUsage::new(used_bytes(&self.data()), self.capacity)
    }

    fn sizes_with_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>, StoreError> {
        Ok(prefixed_sizes(&self.data(), prefix))
    }

    fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut data = self.data();
        let removed: Vec<(String, String)> = keys
            .iter()
            .filter_map(|k| data.remove_entry(k))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.persist(&data) {
            data.extend(removed);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path, None).unwrap();
            store.set("asset_cache_a", "{\"payload\":\"\"}").unwrap();
            store.set("other", "kept").unwrap();
            store.remove("other").unwrap();
        }

        let store = FileStore::open(&path, None).unwrap();
        assert_eq!(
            store.get("asset_cache_a").unwrap().as_deref(),
            Some("{\"payload\":\"\"}")
        );
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.json");

        let store = FileStore::open(&path, None).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_quota_exceeded_is_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path, Some(8)).unwrap();
        store.set("a", "123").unwrap();
        assert!(store.set("b", "12345").unwrap_err().is_quota_exceeded());

        let reopened = FileStore::open(&path, Some(8)).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["a"]);
        assert_eq!(reopened.usage().used_bytes, 4);
        assert_eq!(reopened.usage().capacity_bytes, Some(8));
    }

    #[test]
    fn test_remove_many_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path, None).unwrap();
        for key in ["asset_cache_a", "asset_cache_b", "asset_cache_c", "prefs"] {
            store.set(key, "v").unwrap();
        }
        store
            .remove_many(&[
                "asset_cache_a".to_string(),
                "asset_cache_c".to_string(),
                "missing".to_string(),
            ])
            .unwrap();

        let reopened = FileStore::open(&path, None).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["asset_cache_b", "prefs"]);
        assert_eq!(
            reopened.sizes_with_prefix("asset_cache_").unwrap(),
            vec![("asset_cache_b".to_string(), 1)]
        );
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = FileStore::open(&path, None).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn test_empty_file_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "").unwrap();

        let store = FileStore::open(&path, None).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
