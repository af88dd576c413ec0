//! Client-resident cache for large binary assets
//!
//! Assets (3D models, textures) are fetched on a miss and stored base64-encoded
//! in a shared, quota-limited string key-value store. Entries expire after a
//! TTL, oversized or excluded assets are never stored, and the namespace is
//! kept within a byte budget by evicting oldest entries first. Storage trouble
//! never fails a lookup: the fetched bytes are returned regardless.

pub mod admission;
mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod eviction;
pub mod key;
pub mod source;
pub mod store;
mod types;

pub use admission::{Admission, AdmissionPolicy, Rejection};
pub use cache::{AssetCache, Lookup, Resolution, Served, StoreOutcome};
pub use codec::{CacheEntry, EncodedEntry};
pub use config::CacheConfig;
pub use error::{AssetCacheError, CodecError, FetchError, Result, StoreError};
pub use eviction::EvictionManager;
pub use key::{CacheKey, Clock, ManualClock, SystemClock};
pub use source::{AssetSource, HttpAssetSource};
pub use store::{CacheStore, FileStore, KeyValueStore, MemoryStore};
pub use types::{CacheStats, CleanupReport, EntryStats, StorageUsage};
