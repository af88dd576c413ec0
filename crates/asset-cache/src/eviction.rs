//! Size- and age-driven eviction over the cache namespace

use crate::config::hours_to_millis;
use crate::error::StoreError;
use crate::key::Clock;
use crate::store::{CacheStore, NamespaceSnapshot, StoredEntry};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// True when an entry created at `created_at` has reached `ttl_millis` of age.
/// The boundary is inclusive.
pub fn is_expired(now_millis: i64, created_at: i64, ttl_millis: i64) -> bool {
    now_millis.saturating_sub(created_at) >= ttl_millis
}

/// Sort candidates oldest first; equal ages put the largest entry first
pub fn sort_for_eviction(entries: &mut [StoredEntry]) {
    entries.sort_by_key(|e| (e.entry.created_at, Reverse(e.size)));
}

/// Evicts namespace entries to meet a size target or an age limit
///
/// Every pass works on a fresh snapshot. Two passes racing each other may both
/// act on stale totals; callers needing a strict bound must serialize them.
#[derive(Clone)]
pub struct EvictionManager {
    store: CacheStore,
    clock: Arc<dyn Clock>,
}

impl EvictionManager {
    pub fn new(store: CacheStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Evict entries until the namespace occupies at most `target_size` bytes.
    /// Returns the number of bytes freed.
    pub fn reclaim(&self, target_size: u64) -> Result<u64, StoreError> {
        let snapshot = self.store.all_entries()?;
        let mut reclaimed = self.drop_corrupt(&snapshot)?;

        let total = snapshot.total_size();
        if total <= target_size {
            debug!(total, target_size, "Cache size within target, no eviction needed");
            return Ok(reclaimed);
        }

        let mut candidates = snapshot.entries;
        sort_for_eviction(&mut candidates);

        let mut current = total;
        let mut victims = Vec::new();
        for candidate in &candidates {
            if current <= target_size {
                break;
            }
            victims.push(candidate.key.clone());
            current -= candidate.size;
            reclaimed += candidate.size;
            debug!(
                key = %candidate.key.digest(),
                size = candidate.size,
                created_at = candidate.entry.created_at,
                "Evicting cache entry"
            );
        }
        self.store.remove_keys(&victims)?;

        info!(
            removed = victims.len(),
            reclaimed,
            before = total,
            after = current,
            target_size,
            "Cache reclaim completed"
        );
        Ok(reclaimed)
    }

    /// Remove every entry at least `max_age_hours` old. Returns the count removed.
    pub fn evict_expired(&self, max_age_hours: u64) -> Result<usize, StoreError> {
        let snapshot = self.store.all_entries()?;
        self.drop_corrupt(&snapshot)?;

        let now = self.clock.now_millis();
        let max_age = hours_to_millis(max_age_hours);

        let mut expired = Vec::new();
        for stored in &snapshot.entries {
            if is_expired(now, stored.entry.created_at, max_age) {
                debug!(
                    key = %stored.key.digest(),
                    age_ms = now.saturating_sub(stored.entry.created_at),
                    "Removing expired cache entry"
                );
                expired.push(stored.key.clone());
            }
        }
        self.store.remove_keys(&expired)?;

        info!(removed = expired.len(), max_age_hours, "Expired entry sweep completed");
        Ok(expired.len())
    }

    /// Remove every entry whose stored size exceeds `max_bytes`
    pub fn evict_larger_than(&self, max_bytes: u64) -> Result<usize, StoreError> {
        let snapshot = self.store.all_entries()?;

        let mut large = Vec::new();
        for stored in snapshot.entries.iter().filter(|e| e.size > max_bytes) {
            debug!(key = %stored.key.digest(), size = stored.size, "Removing large cache entry");
            large.push(stored.key.clone());
        }
        self.store.remove_keys(&large)?;

        info!(removed = large.len(), max_bytes, "Large entry sweep completed");
        Ok(large.len())
    }

    fn drop_corrupt(&self, snapshot: &NamespaceSnapshot) -> Result<u64, StoreError> {
        let mut freed = 0;
        let mut keys = Vec::with_capacity(snapshot.corrupt.len());
        for (key, size) in &snapshot.corrupt {
            warn!(key = %key.digest(), size, "Removing undecodable cache entry");
            keys.push(key.clone());
            freed += size;
        }
        self.store.remove_keys(&keys)?;
        Ok(freed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CacheEntry;
    use crate::key::ManualClock;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::time::Duration;

    const NS: &str = "asset_cache_";
    const T0: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 60 * 60 * 1000;

    struct Fixture {
        backend: Arc<MemoryStore>,
        store: CacheStore,
        clock: Arc<ManualClock>,
        manager: EvictionManager,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryStore::new());
        let store = CacheStore::new(backend.clone(), NS);
        let clock = Arc::new(ManualClock::new(T0));
        let manager = EvictionManager::new(store.clone(), clock.clone());
        Fixture {
            backend,
            store,
            clock,
            manager,
        }
    }

    /// Insert an entry and return its stored size
    fn put(store: &CacheStore, name: &str, payload_len: usize, created_at: i64) -> u64 {
        let url = format!("https://a.example/{}", name);
        let encoded = CacheEntry::new(&vec![0xAB; payload_len], created_at, &url)
            .encode()
            .unwrap();
        store.set(&store.key_for(&url), &encoded).unwrap();
        encoded.size()
    }

    fn remaining(store: &CacheStore) -> Vec<String> {
        let mut urls: Vec<String> = store
            .all_entries()
            .unwrap()
            .entries
            .into_iter()
            .map(|e| e.entry.source_url)
            .collect();
        urls.sort();
        urls
    }

    #[test]
    fn test_is_expired_boundary_is_inclusive() {
        let ttl = 24 * HOUR_MS;
        assert!(is_expired(T0 + ttl, T0, ttl));
        assert!(!is_expired(T0 + ttl - 1_000, T0, ttl));
        assert!(is_expired(T0 + ttl + 1_000, T0, ttl));
    }

    #[test]
    fn test_reclaim_noop_within_target() {
        let f = fixture();
        let size = put(&f.store, "a.glb", 100, T0);

        assert_eq!(f.manager.reclaim(size).unwrap(), 0);
        assert_eq!(remaining(&f.store).len(), 1);
    }

    #[test]
    fn test_reclaim_evicts_oldest_first() {
        let f = fixture();
        let s1 = put(&f.store, "1.glb", 300, T0);
        let s2 = put(&f.store, "2.glb", 300, T0 + 1_000);
        let s3 = put(&f.store, "3.glb", 300, T0 + 2_000);

        let reclaimed = f.manager.reclaim(s2 + s3).unwrap();
        assert_eq!(reclaimed, s1);
        assert_eq!(
            remaining(&f.store),
            vec!["https://a.example/2.glb", "https://a.example/3.glb"]
        );
    }

    #[test]
    fn test_reclaim_breaks_ties_by_largest() {
        let f = fixture();
        let small = put(&f.store, "small.glb", 100, T0);
        put(&f.store, "large.glb", 900, T0);
        let newer = put(&f.store, "newer.glb", 900, T0 + 1_000);

        f.manager.reclaim(small + newer).unwrap();
        assert_eq!(
            remaining(&f.store),
            vec!["https://a.example/newer.glb", "https://a.example/small.glb"]
        );
    }

    #[test]
    fn test_reclaim_meets_target_or_empties() {
        let f = fixture();
        for (i, len) in [120usize, 800, 40, 560, 330, 75].iter().enumerate() {
            put(&f.store, &format!("{}.bin", i), *len, T0 + (i as i64 % 3) * 1_000);
        }

        for target in [5_000u64, 2_000, 700, 1] {
            f.manager.reclaim(target).unwrap();
            let snapshot = f.store.all_entries().unwrap();
            assert!(snapshot.total_size() <= target || snapshot.entries.is_empty());
        }
        f.manager.reclaim(0).unwrap();
        assert!(remaining(&f.store).is_empty());
    }

    #[test]
    fn test_reclaim_drops_corrupt_entries() {
        let f = fixture();
        put(&f.store, "ok.glb", 10, T0);
        f.backend.set(&format!("{}junk", NS), "not-json").unwrap();

        let reclaimed = f.manager.reclaim(u64::MAX).unwrap();
        assert_eq!(reclaimed, "not-json".len() as u64);
        assert_eq!(f.backend.get(&format!("{}junk", NS)).unwrap(), None);
        assert_eq!(remaining(&f.store).len(), 1);
    }

    #[test]
    fn test_evict_expired() {
        let f = fixture();
        put(&f.store, "old.glb", 10, T0);
        put(&f.store, "edge.glb", 10, T0 + HOUR_MS);
        put(&f.store, "fresh.glb", 10, T0 + 2 * HOUR_MS);

        f.clock.advance(Duration::from_secs(25 * 60 * 60));
        // old: 25h, edge: exactly 24h, fresh: 23h
        assert_eq!(f.manager.evict_expired(24).unwrap(), 2);
        assert_eq!(remaining(&f.store), vec!["https://a.example/fresh.glb"]);
    }

    #[test]
    fn test_evict_expired_with_unbounded_age_keeps_entries() {
        let f = fixture();
        put(&f.store, "fresh.glb", 10, T0);
        put(&f.store, "old.glb", 10, T0 - 1_000 * HOUR_MS);

        assert_eq!(f.manager.evict_expired(u64::MAX).unwrap(), 0);
        assert_eq!(remaining(&f.store).len(), 2);
    }

    #[test]
    fn test_evict_larger_than() {
        let f = fixture();
        let small = put(&f.store, "small.jpg", 10, T0);
        put(&f.store, "big.glb", 2_000, T0);
        put(&f.store, "bigger.glb", 3_000, T0);

        assert_eq!(f.manager.evict_larger_than(small).unwrap(), 2);
        assert_eq!(remaining(&f.store), vec!["https://a.example/small.jpg"]);
    }
}
