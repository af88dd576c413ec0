//! Cache types

use serde::{Deserialize, Serialize};

/// Total bytes held by the key-value store, across every namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    /// `None` when the store does not expose its limit
    pub capacity_bytes: Option<u64>,
}

impl StorageUsage {
    pub fn new(used_bytes: u64, capacity_bytes: Option<u64>) -> Self {
        Self {
            used_bytes,
            capacity_bytes,
        }
    }

    /// Used share of the capacity, rounded to whole percent
    pub fn percentage(&self) -> Option<u8> {
        let capacity = self.capacity_bytes.filter(|c| *c > 0)?;
        let pct = (u128::from(self.used_bytes) * 100 + u128::from(capacity) / 2)
            / u128::from(capacity);
        Some(pct.min(u128::from(u8::MAX)) as u8)
    }
}

/// Diagnostic view of one cached entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    /// Truncated digest of the key, never the raw key
    pub key_digest: String,
    pub size_bytes: u64,
    pub age_seconds: u64,
    pub source_url: String,
    pub created_at: i64,
}

/// Read-only snapshot of the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_size_bytes: u64,
    pub entry_count: usize,
    /// Ordered oldest first
    pub entries: Vec<EntryStats>,
    pub corrupt_entries: usize,
    pub storage_usage: StorageUsage,
    pub hits: u64,
    pub misses: u64,
    pub admission_rejections: u64,
    pub store_failures: u64,
}

/// What a housekeeping pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Usage percentage that triggered (or skipped) the pass
    pub usage_percent: u8,
    pub expired_removed: usize,
    pub large_removed: usize,
}

impl CleanupReport {
    pub fn total_removed(&self) -> usize {
        self.expired_removed + self.large_removed
    }
}
