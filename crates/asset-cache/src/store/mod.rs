//! Key-value store collaborator and the namespaced cache view over it
//!
//! The backing store is synchronous, string-keyed and string-valued, with an
//! optional byte capacity. `CacheStore` scopes every operation to the cache
//! namespace and turns stored strings back into [`CacheEntry`] values.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::codec::{CacheEntry, EncodedEntry};
use crate::error::StoreError;
use crate::key::CacheKey;
use crate::types::StorageUsage;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A synchronous string key-value store with an opaque capacity
///
/// `set` is all-or-nothing: on error the store is left unchanged. A write
/// that does not fit fails with [`StoreError::QuotaExceeded`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// Snapshot of every key currently in the store
    fn keys(&self) -> Result<Vec<String>, StoreError>;
    fn usage(&self) -> StorageUsage;

    /// Keys starting with `prefix` with the byte length of their values
    fn sizes_with_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>, StoreError> {
        let mut sizes = Vec::new();
        for key in self.keys()?.into_iter().filter(|k| k.starts_with(prefix)) {
            if let Some(value) = self.get(&key)? {
                sizes.push((key, value.len() as u64));
            }
        }
        Ok(sizes)
    }

    /// Remove several keys; absent keys are ignored
    fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Bytes a key-value pair occupies against the store capacity
pub(crate) fn footprint(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

pub(crate) fn used_bytes(map: &BTreeMap<String, String>) -> u64 {
    map.iter().map(|(k, v)| footprint(k, v)).sum()
}

pub(crate) fn prefixed_sizes(map: &BTreeMap<String, String>, prefix: &str) -> Vec<(String, u64)> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.len() as u64))
        .collect()
}

/// Check that writing `value` at `key` stays within `capacity`
pub(crate) fn check_quota(
    map: &BTreeMap<String, String>,
    capacity: Option<u64>,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    let Some(capacity) = capacity else {
        return Ok(());
    };

    let replaced = map.get(key).map(|old| footprint(key, old)).unwrap_or(0);
    let used = used_bytes(map) - replaced;
    let requested = footprint(key, value);

    if used + requested > capacity {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            requested,
            available: capacity.saturating_sub(used),
        });
    }
    Ok(())
}

/// An entry read back from the namespace
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub key: CacheKey,
    pub entry: CacheEntry,
    /// Serialized size in bytes
    pub size: u64,
}

/// Point-in-time view of every key in the namespace
#[derive(Debug, Clone, Default)]
pub struct NamespaceSnapshot {
    pub entries: Vec<StoredEntry>,
    /// Keys whose values do not decode, with their sizes
    pub corrupt: Vec<(CacheKey, u64)>,
}

impl NamespaceSnapshot {
    /// Total serialized size of the decodable entries
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// The cache's namespaced view of a shared [`KeyValueStore`]
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            backend,
            namespace: namespace.to_string(),
        }
    }

    pub fn key_for(&self, url: &str) -> CacheKey {
        CacheKey::from_url(&self.namespace, url)
    }

    /// Read an entry; a value that fails to decode is removed and reported as absent
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let Some(value) = self.backend.get(key.as_str())? else {
            return Ok(None);
        };

        match CacheEntry::decode(&value) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key = %key.digest(), error = %e, "Corrupt cache entry, removing");
                if let Err(e) = self.backend.remove(key.as_str()) {
                    warn!(key = %key.digest(), error = %e, "Failed to remove corrupt entry");
                }
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &CacheKey, entry: &EncodedEntry) -> Result<(), StoreError> {
        self.backend.set(key.as_str(), entry.as_str())?;
        debug!(key = %key.digest(), size = entry.size(), "Stored cache entry");
        Ok(())
    }

    pub fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.backend.remove(key.as_str())
    }

    /// Serialized size of the entry at `key`, if present
    pub fn entry_size(&self, key: &CacheKey) -> Result<Option<u64>, StoreError> {
        Ok(self.backend.get(key.as_str())?.map(|v| v.len() as u64))
    }

    /// Serialized size of the namespace, skipping `except`. Values are not decoded.
    pub fn namespace_size(&self, except: Option<&CacheKey>) -> Result<u64, StoreError> {
        Ok(self
            .backend
            .sizes_with_prefix(&self.namespace)?
            .into_iter()
            .filter(|(key, _)| except.map_or(true, |k| k.as_str() != key))
            .map(|(_, size)| size)
            .sum())
    }

    /// Remove a batch of entries in one store operation
    pub fn remove_keys(&self, keys: &[CacheKey]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let raw: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        self.backend.remove_many(&raw)
    }

    /// Fresh snapshot of all namespace entries; never a live view
    pub fn all_entries(&self) -> Result<NamespaceSnapshot, StoreError> {
        let mut snapshot = NamespaceSnapshot::default();

        for raw in self.backend.keys()? {
            if !raw.starts_with(&self.namespace) {
                continue;
            }
            // Removed between listing and reading
            let Some(value) = self.backend.get(&raw)? else {
                continue;
            };

            let key = CacheKey::from_raw(raw);
            let size = value.len() as u64;
            match CacheEntry::decode(&value) {
                Ok(entry) => snapshot.entries.push(StoredEntry { key, entry, size }),
                Err(_) => snapshot.corrupt.push((key, size)),
            }
        }

        Ok(snapshot)
    }

    /// Remove every key in the namespace, returning how many were removed
    pub fn remove_all(&self) -> Result<usize, StoreError> {
        let keys: Vec<String> = self
            .backend
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(&self.namespace))
            .collect();

        self.backend.remove_many(&keys)?;
        Ok(keys.len())
    }

    pub fn usage(&self) -> StorageUsage {
        self.backend.usage()
    }
}
