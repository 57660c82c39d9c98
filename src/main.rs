//! Edge Purge command line
//!
//! Purges a comma-separated list of URLs from the configured zone.

use anyhow::{bail, Context};
use edge_purge::{CacheInvalidationService, InMemoryEntityStore, InMemoryJobQueue, PurgeConfig};
use std::env;
use std::sync::Arc;
use tracing::{error, info};

/// Main entry point for the purge-URL task
///
/// # Usage
/// ```bash
/// edge-purge edge_purge.yaml "https://www.example.com/,/news/"
/// ```
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let (config_path, url_arg) = match (args.next(), args.next()) {
        (Some(config_path), Some(url_arg)) => (config_path, url_arg),
        _ => bail!("usage: edge-purge <config.yaml> <url[,url...]>"),
    };

    info!("Loading configuration from: {}", config_path);
    let config = PurgeConfig::from_file(&config_path)
        .with_context(|| format!("invalid configuration in {}", config_path))?;

    info!("Configuration loaded successfully");
    info!("  - Enabled: {}", config.enabled);
    info!("  - Zone: {}", config.zone_id);
    info!("  - Base URL: {:?}", config.base_url);
    info!("  - Chunk size: {}", config.chunk_size);

    let urls: Vec<String> = url_arg
        .split(',')
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if urls.is_empty() {
        bail!("no URLs given");
    }

    let service = CacheInvalidationService::new(
        Arc::new(config),
        Arc::new(InMemoryJobQueue::new()),
        Arc::new(InMemoryEntityStore::new()),
    )
    .context("failed to create purge service")?;

    for url in service.normalize_urls(&urls) {
        println!("URL: {}", url);
    }

    let response = match service.purge_urls(&urls).await {
        Some(response) => response,
        None => {
            println!("Nothing purged: purging is disabled");
            return Ok(());
        }
    };

    println!("Requests: {}", response.result_count());
    println!("Successes: {}", response.success_ids().len());
    for id in response.success_ids() {
        println!("  {}", id);
    }
    println!("Errors: {}", response.errors().len());
    for err in response.errors() {
        println!("  {}", err.describe());
    }
    for exception in response.exceptions() {
        println!("Exception: {}", exception);
    }

    if !response.all_success() {
        bail!("purge did not fully succeed");
    }
    Ok(())
}
