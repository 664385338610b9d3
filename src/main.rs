use chrono::Utc;
use price_matcher::config::{AppConfig, load_config};
use price_matcher::logging;
use price_matcher::matcher::MatchingEngine;
use price_matcher::report::{render_product, write_json};
use price_matcher::source::{ListingSource, build_source, fetch_all};
use price_matcher::storage::SqliteStorage;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    logging::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    let mut sources: Vec<Box<dyn ListingSource>> = Vec::new();
    for source_cfg in &config.sources {
        match build_source(source_cfg) {
            Ok(source) => sources.push(source),
            Err(e) => warn!("Skipping listing source: {}", e),
        }
    }
    if sources.is_empty() {
        error!("No usable listing source configured");
        return;
    }

    let cache = match &config.cache_path {
        Some(path) => match SqliteStorage::new(path) {
            Ok(storage) => Some(storage),
            Err(e) => {
                warn!("Listing cache disabled ({}): {}", path.display(), e);
                None
            }
        },
        None => None,
    };

    loop {
        refresh(&config, &sources, cache.as_ref()).await;

        if config.check_interval_seconds == 0 {
            break;
        }

        info!("Waiting for timer ({}s) or Ctrl-C...", config.check_interval_seconds);
        tokio::select! {
            _ = sleep(Duration::from_secs(config.check_interval_seconds)) => {
                info!("Timer triggered.");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down.");
                break;
            }
        }
    }
}

/// Fetches all sources, matches the snapshot and publishes the product cards.
async fn refresh(config: &AppConfig, sources: &[Box<dyn ListingSource>], cache: Option<&SqliteStorage>) {
    info!("Fetching listings from {} sources...", sources.len());
    let listings = fetch_all(sources, &config.store_filter()).await;
    if listings.is_empty() {
        warn!("No listings fetched, nothing to match");
        return;
    }

    if let Some(cache) = cache {
        match cache.save_snapshot(&listings) {
            Ok(rows) => info!("Listing cache holds {} rows", rows),
            Err(e) => warn!("Failed to cache listings: {}", e),
        }
    }

    let engine = MatchingEngine::new(&config.matching, Utc::now());
    let outcome = engine.match_listings(&listings);

    for product in outcome.products.iter().filter(|p| p.store_count() > 1) {
        info!("\n{}", render_product(product));
    }

    if let Some(path) = &config.output_path {
        match write_json(path, &outcome.products).await {
            Ok(()) => info!("Wrote {} products to {}", outcome.products.len(), path.display()),
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }
}
