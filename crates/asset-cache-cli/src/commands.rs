//! Subcommands and their handlers

use crate::error::Result;
use asset_cache::{AssetCache, Rejection, Served, StoreOutcome};
use clap::Subcommand;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

const DEFAULT_LARGE_ENTRY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a URL through the cache, fetching on a miss
    Fetch {
        url: String,
        /// Write the asset bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show cache contents, sizes and storage usage
    Stats,
    /// Remove the cached entry for a URL
    Invalidate { url: String },
    /// Remove every cached entry
    Clear,
    /// Remove entries older than the TTL (or the given age)
    Sweep {
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
    /// Evict oldest entries until the cache fits the target size
    Reclaim {
        /// Defaults to 70% of the configured budget
        #[arg(long)]
        target_bytes: Option<u64>,
    },
    /// Remove entries larger than the given size
    PruneLarge {
        #[arg(long, default_value_t = DEFAULT_LARGE_ENTRY_BYTES)]
        max_bytes: u64,
    },
    /// Housekeeping driven by storage usage
    Cleanup,
}

#[derive(Debug, Serialize)]
struct FetchSummary {
    url: String,
    bytes: usize,
    served: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

fn describe(served: &Served) -> String {
    match served {
        Served::Hit => "cache hit".to_string(),
        Served::Fetched(StoreOutcome::Stored) => "fetched, cached".to_string(),
        Served::Fetched(StoreOutcome::StoredAfterReclaim) => {
            "fetched, cached after reclaim".to_string()
        }
        Served::Fetched(StoreOutcome::GaveUp) => "fetched, not cached (store failed)".to_string(),
        Served::Fetched(StoreOutcome::Rejected(rejection)) => match rejection {
            Rejection::ExcludedCategory { pattern } => {
                format!("fetched, not cached (excluded by {:?})", pattern)
            }
            Rejection::TooLarge { size, max } => {
                format!("fetched, not cached ({} bytes exceeds {})", size, max)
            }
            Rejection::OverBudget { projected, max } => {
                format!("fetched, not cached (would reach {} of {} bytes)", projected, max)
            }
        },
    }
}

/// Run one command against the cache, returning the report to print
pub async fn run(cache: &AssetCache, command: Command) -> Result<Value> {
    let report = match command {
        Command::Fetch { url, output } => {
            let resolution = cache.resolve_detailed(&url).await?;
            if let Some(path) = &output {
                tokio::fs::write(path, &resolution.payload).await?;
                info!(path = ?path, bytes = resolution.payload.len(), "Wrote asset");
            }
            serde_json::to_value(FetchSummary {
                served: describe(&resolution.served),
                bytes: resolution.payload.len(),
                url,
                output,
            })?
        }
        Command::Stats => serde_json::to_value(cache.stats()?)?,
        Command::Invalidate { url } => {
            let removed = cache.invalidate(&url)?;
            json!({ "url": url, "removed": removed })
        }
        Command::Clear => json!({ "removed": cache.clear()? }),
        Command::Sweep { max_age_hours } => {
            let removed = match max_age_hours {
                Some(hours) => cache.eviction().evict_expired(hours)?,
                None => cache.evict_expired()?,
            };
            json!({ "removed": removed })
        }
        Command::Reclaim { target_bytes } => {
            let target = target_bytes.unwrap_or_else(|| cache.config().reclaim_target());
            let reclaimed = cache.eviction().reclaim(target)?;
            json!({ "target_bytes": target, "reclaimed_bytes": reclaimed })
        }
        Command::PruneLarge { max_bytes } => {
            let removed = cache.eviction().evict_larger_than(max_bytes)?;
            json!({ "max_bytes": max_bytes, "removed": removed })
        }
        Command::Cleanup => serde_json::to_value(cache.smart_cleanup()?)?,
    };
    Ok(report)
}
