//! Cache configuration

use crate::error::{AssetCacheError, Result};
use serde::{Deserialize, Serialize};
use std::env;

const MIB: u64 = 1024 * 1024;
const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Options recognized by the asset cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Key prefix reserved for this cache inside the shared store
    pub namespace: String,
    /// Per-entry admission ceiling, applied to the serialized entry
    pub max_file_size_bytes: u64,
    /// Namespace budget used by admission and eviction
    pub max_total_size_bytes: u64,
    /// Age after which an entry is a miss on next read
    pub ttl_hours: u64,
    /// URL substrings that are never cached
    pub excluded_url_patterns: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "asset_cache_".to_string(),
            max_file_size_bytes: 5 * MIB,
            max_total_size_bytes: 50 * MIB,
            ttl_hours: 24,
            excluded_url_patterns: vec![
                "environments/".to_string(),
                "panorama".to_string(),
                ".exr".to_string(),
                ".hdr".to_string(),
            ],
        }
    }
}

impl CacheConfig {
    /// Parse configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let namespace = env::var("ASSET_CACHE_NAMESPACE").unwrap_or(defaults.namespace);

        let max_file_size_bytes = env::var("ASSET_CACHE_MAX_FILE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_file_size_bytes);

        let max_total_size_bytes = env::var("ASSET_CACHE_MAX_TOTAL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_total_size_bytes);

        let ttl_hours = env::var("ASSET_CACHE_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.ttl_hours);

        let excluded_url_patterns = env::var("ASSET_CACHE_EXCLUDED_PATTERNS")
            .map(|s| parse_patterns(&s))
            .unwrap_or(defaults.excluded_url_patterns);

        Self {
            namespace,
            max_file_size_bytes,
            max_total_size_bytes,
            ttl_hours,
            excluded_url_patterns,
        }
    }

    /// Reject settings the cache cannot operate under
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(AssetCacheError::Config(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.max_file_size_bytes == 0 || self.max_total_size_bytes == 0 {
            return Err(AssetCacheError::Config(
                "size limits must be greater than zero".to_string(),
            ));
        }
        if self.max_file_size_bytes > self.max_total_size_bytes {
            return Err(AssetCacheError::Config(format!(
                "max_file_size_bytes ({}) exceeds max_total_size_bytes ({})",
                self.max_file_size_bytes, self.max_total_size_bytes
            )));
        }
        if self.ttl_hours == 0 {
            return Err(AssetCacheError::Config(
                "ttl_hours must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ttl_millis(&self) -> i64 {
        hours_to_millis(self.ttl_hours)
    }

    /// Opportunistic reclaim target: 70% of the namespace budget
    pub fn reclaim_target(&self) -> u64 {
        (u128::from(self.max_total_size_bytes) * 7 / 10) as u64
    }
}

pub(crate) fn hours_to_millis(hours: u64) -> i64 {
    i64::try_from(hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(MILLIS_PER_HOUR)
}

fn parse_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.namespace, "asset_cache_");
        assert_eq!(config.max_file_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_total_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.ttl_hours, 24);
        assert!(config.excluded_url_patterns.contains(&".exr".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ttl_millis() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_millis(), 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        assert_eq!(hours_to_millis(u64::MAX), i64::MAX);
        assert_eq!(hours_to_millis(i64::MAX as u64 + 1), i64::MAX);

        let config = CacheConfig {
            ttl_hours: u64::MAX,
            ..CacheConfig::default()
        };
        assert_eq!(config.ttl_millis(), i64::MAX);
    }

    #[test]
    fn test_reclaim_target_is_seventy_percent() {
        let config = CacheConfig {
            max_total_size_bytes: 10_000_000,
            ..CacheConfig::default()
        };
        assert_eq!(config.reclaim_target(), 7_000_000);

        let config = CacheConfig {
            max_total_size_bytes: 15,
            max_file_size_bytes: 1,
            ..CacheConfig::default()
        };
        assert_eq!(config.reclaim_target(), 10);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let config = CacheConfig {
            max_file_size_bytes: 10,
            max_total_size_bytes: 5,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CacheConfig {
            namespace: String::new(),
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CacheConfig {
            ttl_hours: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_patterns() {
        assert_eq!(
            parse_patterns(" panorama , .hdr,,skybox/ "),
            vec!["panorama", ".hdr", "skybox/"]
        );
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"ttl_hours": 6, "excluded_url_patterns": []}"#).unwrap();
        assert_eq!(config.ttl_hours, 6);
        assert!(config.excluded_url_patterns.is_empty());
        assert_eq!(config.namespace, "asset_cache_");
    }
}
