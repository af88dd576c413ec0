//! The asset cache: fetch-on-miss with best-effort storage
//!
//! Each `resolve` walks CHECK_CACHE → (hit | expired | miss) → FETCH →
//! ADMIT_CHECK → STORE_ATTEMPT → (stored | quota exceeded → reclaim → one
//! retry → stored | give up) → RETURN. Only a fetch failure reaches the caller;
//! every caching problem degrades to serving the fetched bytes uncached.

use crate::admission::{Admission, AdmissionPolicy, Rejection};
use crate::codec::CacheEntry;
use crate::config::CacheConfig;
use crate::error::{FetchError, Result, StoreError};
use crate::eviction::{is_expired, EvictionManager};
use crate::key::{CacheKey, Clock, SystemClock};
use crate::source::AssetSource;
use crate::store::{CacheStore, KeyValueStore};
use crate::types::{CacheStats, CleanupReport, EntryStats};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CLEANUP_HIGH_WATER_PERCENT: u8 = 80;
const CLEANUP_LOW_WATER_PERCENT: u8 = 70;
const CLEANUP_MAX_AGE_HOURS: u64 = 12;
const CLEANUP_LARGE_ENTRY_BYTES: u64 = 1024 * 1024;

/// Result of looking a key up before fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    HitFresh(Vec<u8>),
    /// Entry was past its TTL and has been removed
    HitExpired,
    Miss,
}

/// How a fetched payload fared in the storage step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// First write hit the quota; stored on the retry after reclaiming
    StoredAfterReclaim,
    Rejected(Rejection),
    /// Could not be stored; served uncached
    GaveUp,
}

/// Where a resolved payload came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    Hit,
    Fetched(StoreOutcome),
}

/// Payload plus the path `resolve` took to produce it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub payload: Vec<u8>,
    pub served: Served,
}

impl Resolution {
    pub fn from_cache(&self) -> bool {
        self.served == Served::Hit
    }
}

/// Binary asset cache over a shared, quota-limited key-value store
pub struct AssetCache {
    config: CacheConfig,
    store: CacheStore,
    policy: AdmissionPolicy,
    eviction: EvictionManager,
    source: Arc<dyn AssetSource>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    admission_rejections: AtomicU64,
    store_failures: AtomicU64,
}

impl AssetCache {
    /// Create a cache using the system clock
    pub fn new(
        config: CacheConfig,
        backend: Arc<dyn KeyValueStore>,
        source: Arc<dyn AssetSource>,
    ) -> Result<Self> {
        Self::with_clock(config, backend, source, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        backend: Arc<dyn KeyValueStore>,
        source: Arc<dyn AssetSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = CacheStore::new(backend, &config.namespace);
        let eviction = EvictionManager::new(store.clone(), clock.clone());

        Ok(Self {
            policy: AdmissionPolicy::new(&config),
            config,
            store,
            eviction,
            source,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            admission_rejections: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn eviction(&self) -> &EvictionManager {
        &self.eviction
    }

    /// Return the asset bytes for `url`, from cache when fresh, otherwise
    /// fetched. Fails only when the fetch fails.
    pub async fn resolve(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        Ok(self.resolve_detailed(url).await?.payload)
    }

    /// Like [`resolve`](Self::resolve), also reporting how the payload was served
    pub async fn resolve_detailed(
        &self,
        url: &str,
    ) -> std::result::Result<Resolution, FetchError> {
        let key = self.store.key_for(url);

        match self.check_cache(&key) {
            Lookup::HitFresh(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key.digest(), url = %url, "Cache hit");
                return Ok(Resolution {
                    payload,
                    served: Served::Hit,
                });
            }
            Lookup::HitExpired | Lookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        let payload = self.source.fetch(url).await?;
        let outcome = self.store_fetched(&key, url, &payload);

        Ok(Resolution {
            payload,
            served: Served::Fetched(outcome),
        })
    }

    /// Look up `key`, removing it if expired or undecodable
    pub fn check_cache(&self, key: &CacheKey) -> Lookup {
        let entry = match self.store.get(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Lookup::Miss,
            Err(e) => {
                warn!(key = %key.digest(), error = %e, "Cache read failed, treating as miss");
                return Lookup::Miss;
            }
        };

        if is_expired(
            self.clock.now_millis(),
            entry.created_at,
            self.config.ttl_millis(),
        ) {
            debug!(key = %key.digest(), created_at = entry.created_at, "Cache entry expired");
            self.remove_quietly(key);
            return Lookup::HitExpired;
        }

        match entry.payload_bytes() {
            Ok(payload) => Lookup::HitFresh(payload),
            Err(e) => {
                warn!(key = %key.digest(), error = %e, "Undecodable payload, removing entry");
                self.remove_quietly(key);
                Lookup::Miss
            }
        }
    }

    fn store_fetched(&self, key: &CacheKey, url: &str, payload: &[u8]) -> StoreOutcome {
        let encoded = match CacheEntry::new(payload, self.clock.now_millis(), url).encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to encode cache entry");
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                return StoreOutcome::GaveUp;
            }
        };

        match self.admit(key, url, encoded.size()) {
            Ok(None) => {}
            Ok(Some(rejection)) => {
                self.admission_rejections.fetch_add(1, Ordering::Relaxed);
                debug!(url = %url, size = encoded.size(), reason = ?rejection, "Skipping cache");
                return StoreOutcome::Rejected(rejection);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Could not size cache namespace, skipping cache");
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                return StoreOutcome::GaveUp;
            }
        }

        match self.store.set(key, &encoded) {
            Ok(()) => StoreOutcome::Stored,
            Err(e) if e.is_quota_exceeded() => {
                warn!(url = %url, size = encoded.size(), "Storage quota exceeded, reclaiming");
                self.reclaim_headroom();

                match self.store.set(key, &encoded) {
                    Ok(()) => {
                        info!(url = %url, "Cached asset after reclaim");
                        StoreOutcome::StoredAfterReclaim
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "Could not cache asset even after reclaim");
                        self.store_failures.fetch_add(1, Ordering::Relaxed);
                        StoreOutcome::GaveUp
                    }
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Could not cache asset");
                self.store_failures.fetch_add(1, Ordering::Relaxed);
                StoreOutcome::GaveUp
            }
        }
    }

    /// Run admission, reclaiming once if the budget projection fails.
    /// `Ok(None)` admits; `Ok(Some(_))` is the rejection.
    fn admit(
        &self,
        key: &CacheKey,
        url: &str,
        size: u64,
    ) -> std::result::Result<Option<Rejection>, StoreError> {
        let mut after_reclaim = false;
        loop {
            // A write to `key` replaces whatever is there
            let namespace_size = self.store.namespace_size(Some(key))?;
            match self
                .policy
                .may_cache(url, size, namespace_size, after_reclaim)
            {
                Admission::Admit => return Ok(None),
                Admission::Reject(rejection) => return Ok(Some(rejection)),
                Admission::ReclaimFirst => {
                    debug!(url = %url, namespace_size, size, "Over budget, reclaiming before admission");
                    self.reclaim_headroom();
                    after_reclaim = true;
                }
            }
        }
    }

    fn reclaim_headroom(&self) {
        if let Err(e) = self.eviction.reclaim(self.config.reclaim_target()) {
            warn!(error = %e, "Cache reclaim failed");
        }
    }

    fn remove_quietly(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(key) {
            warn!(key = %key.digest(), error = %e, "Failed to remove cache entry");
        }
    }

    /// Remove the entry for `url` regardless of freshness. Returns whether one existed.
    pub fn invalidate(&self, url: &str) -> Result<bool> {
        let key = self.store.key_for(url);
        let existed = self.store.entry_size(&key)?.is_some();
        if existed {
            self.store.remove(&key)?;
            debug!(key = %key.digest(), url = %url, "Invalidated cache entry");
        }
        Ok(existed)
    }

    /// Remove every entry in the namespace
    pub fn clear(&self) -> Result<usize> {
        let removed = self.store.remove_all()?;
        info!(removed, "Cleared asset cache");
        Ok(removed)
    }

    /// Remove all entries past the configured TTL
    pub fn evict_expired(&self) -> Result<usize> {
        Ok(self.eviction.evict_expired(self.config.ttl_hours)?)
    }

    /// Read-only diagnostic snapshot
    pub fn stats(&self) -> Result<CacheStats> {
        let snapshot = self.store.all_entries()?;
        let now = self.clock.now_millis();

        let mut stored = snapshot.entries.iter().collect::<Vec<_>>();
        stored.sort_by_key(|e| (e.entry.created_at, e.key.clone()));

        let entries = stored
            .into_iter()
            .map(|e| EntryStats {
                key_digest: e.key.digest(),
                size_bytes: e.size,
                age_seconds: (now.saturating_sub(e.entry.created_at).max(0) / 1000) as u64,
                source_url: e.entry.source_url.clone(),
                created_at: e.entry.created_at,
            })
            .collect::<Vec<_>>();

        Ok(CacheStats {
            total_size_bytes: snapshot.total_size(),
            entry_count: entries.len(),
            entries,
            corrupt_entries: snapshot.corrupt.len(),
            storage_usage: self.store.usage(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admission_rejections: self.admission_rejections.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        })
    }

    /// Storage pressure in percent: store usage when its capacity is known,
    /// otherwise namespace size against the configured budget
    pub fn usage_percent(&self) -> Result<u8> {
        if let Some(pct) = self.store.usage().percentage() {
            return Ok(pct);
        }
        let total = self.store.all_entries()?.total_size();
        let pct = u128::from(total) * 100 / u128::from(self.config.max_total_size_bytes);
        Ok(pct.min(u128::from(u8::MAX)) as u8)
    }

    /// Housekeeping under storage pressure: above 80% usage drop entries older
    /// than 12 hours, and if still above 70% drop entries larger than 1 MiB
    pub fn smart_cleanup(&self) -> Result<CleanupReport> {
        let usage_percent = self.usage_percent()?;
        let mut report = CleanupReport {
            usage_percent,
            ..CleanupReport::default()
        };

        if usage_percent <= CLEANUP_HIGH_WATER_PERCENT {
            debug!(usage_percent, "Storage usage acceptable, no cleanup needed");
            return Ok(report);
        }

        info!(usage_percent, "Storage usage high, performing cleanup");
        report.expired_removed = self.eviction.evict_expired(CLEANUP_MAX_AGE_HOURS)?;

        if self.usage_percent()? > CLEANUP_LOW_WATER_PERCENT {
            report.large_removed = self
                .eviction
                .evict_larger_than(CLEANUP_LARGE_ENTRY_BYTES)?;
        }

        info!(
            expired = report.expired_removed,
            large = report.large_removed,
            "Smart cleanup completed"
        );
        Ok(report)
    }
}
