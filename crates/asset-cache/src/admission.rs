//! Admission policy: which fetched assets may enter the cache
//!
//! Rules apply in order and short-circuit: category exclusion, per-file
//! ceiling, then the total-budget projection. The policy never mutates the
//! store; when the projection fails it asks the caller to reclaim first and
//! to evaluate again with the fresh namespace size.

use crate::config::CacheConfig;

/// Why an asset was not admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// URL matched an excluded pattern
    ExcludedCategory { pattern: String },
    /// Serialized entry is larger than the per-file ceiling
    TooLarge { size: u64, max: u64 },
    /// Namespace would exceed its budget even after reclamation
    OverBudget { projected: u64, max: u64 },
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Over budget on a first check; reclaim and evaluate again
    ReclaimFirst,
    Reject(Rejection),
}

#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    excluded_url_patterns: Vec<String>,
    max_file_size: u64,
    max_total_size: u64,
}

impl AdmissionPolicy {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            excluded_url_patterns: config.excluded_url_patterns.clone(),
            max_file_size: config.max_file_size_bytes,
            max_total_size: config.max_total_size_bytes,
        }
    }

    /// First matching excluded pattern for `url`, if any
    pub fn excluded_pattern(&self, url: &str) -> Option<&str> {
        self.excluded_url_patterns
            .iter()
            .find(|p| url.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Decide whether an entry of `size` serialized bytes may be cached,
    /// given the namespace currently occupies `namespace_size` bytes.
    ///
    /// `after_reclaim` marks the second evaluation; an over-budget projection
    /// is then a final rejection instead of a request to reclaim.
    pub fn may_cache(
        &self,
        url: &str,
        size: u64,
        namespace_size: u64,
        after_reclaim: bool,
    ) -> Admission {
        if let Some(pattern) = self.excluded_pattern(url) {
            return Admission::Reject(Rejection::ExcludedCategory {
                pattern: pattern.to_string(),
            });
        }

        if size > self.max_file_size {
            return Admission::Reject(Rejection::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let projected = namespace_size.saturating_add(size);
        if projected > self.max_total_size {
            if after_reclaim {
                return Admission::Reject(Rejection::OverBudget {
                    projected,
                    max: self.max_total_size,
                });
            }
            return Admission::ReclaimFirst;
        }

        Admission::Admit
    }
}
