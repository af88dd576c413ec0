//! In-process key-value store

use super::{check_quota, prefixed_sizes, used_bytes, KeyValueStore};
use crate::error::StoreError;
use crate::types::StorageUsage;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Ordered in-memory store with an optional byte capacity
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, String>>,
    capacity: Option<u64>,
}

impl MemoryStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes beyond `capacity` bytes (keys plus values)
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            capacity: Some(capacity),
        }
    }

    fn data(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // Every mutation is a single insert or remove
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data();
        check_quota(&data, self.capacity, key, value)?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data().remove(key);
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
}
