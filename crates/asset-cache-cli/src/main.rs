//! Asset cache CLI
//!
//! Drives the asset cache against a file-backed key-value store: resolve URLs
//! through it and inspect or maintain its contents. Reports go to stdout as
//! JSON, logs to stderr.

mod commands;
mod error;

use crate::commands::Command;
use crate::error::{CliError, Result};
use asset_cache::{AssetCache, CacheConfig, FileStore, HttpAssetSource};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_STORE_CAPACITY: u64 = 10 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "asset-cache", version, about = "Inspect and maintain the binary asset cache")]
struct Cli {
    /// JSON file backing the key-value store
    #[arg(long, env = "ASSET_CACHE_STORE", default_value = "./cache/asset-store.json")]
    store: PathBuf,

    /// Byte quota of the key-value store
    #[arg(long, env = "ASSET_CACHE_STORE_CAPACITY", default_value_t = DEFAULT_STORE_CAPACITY)]
    store_capacity: u64,

    /// Request timeout for asset fetches
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env().add_directive("asset_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    let cli = Cli::parse();
    if cli.store_capacity == 0 {
        return Err(CliError::Config(
            "store capacity must be greater than zero".to_string(),
        ));
    }

    let config = CacheConfig::from_env();
    info!(
        store = ?cli.store,
        store_capacity = cli.store_capacity,
        namespace = %config.namespace,
        max_file_size = config.max_file_size_bytes,
        max_total_size = config.max_total_size_bytes,
        ttl_hours = config.ttl_hours,
        "Opening asset cache"
    );

    let store = FileStore::open(&cli.store, Some(cli.store_capacity))?;
    let source = HttpAssetSource::with_timeout(Duration::from_secs(cli.timeout_secs))?;
    let cache = AssetCache::new(config, Arc::new(store), Arc::new(source))?;

    let report = commands::run(&cache, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
