mod config;

use crate::config::Config;
use anyhow::{Context, Result};
use card_pricer_core::clients::{CachedMarketplace, LookupCache, MarketplaceHttpClient};
use card_pricer_core::models::Sku;
use card_pricer_core::pricing::{BatchPricer, BatchProgress, BatchReport};
use card_pricer_core::CancellationFlag;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Log progress every this many SKUs
const PROGRESS_EVERY: usize = 25;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Card Pricer...");

    // Config
    let config = Config::from_env()?;
    info!(
        "Marketplace {} | p{} | half-life {} | supply analysis {} | concurrency {}",
        config.marketplace_base_url,
        config.pricing.percentile,
        config
            .pricing
            .half_life_days
            .map(|d| format!("{}d", d))
            .unwrap_or_else(|| format!("{:?}", config.pricing.half_life_policy)),
        config.pricing.enable_supply_analysis,
        config.pricing.concurrency
    );

    // Inventory
    let skus = load_skus(&config)?;
    info!("Loaded {} SKUs from {}", skus.len(), config.sku_file.display());

    // Marketplace
    let http = MarketplaceHttpClient::with_timeout(
        config.marketplace_base_url.clone(),
        config.marketplace_timeout,
    )?;
    let cache = Arc::new(LookupCache::new());
    let marketplace = Arc::new(CachedMarketplace::new(http, cache.clone()));
    let pricer = BatchPricer::new(marketplace, config.pricing.clone());

    // Ctrl-C stops new SKUs; in-flight ones finish
    let cancel = CancellationFlag::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, finishing in-flight SKUs");
                signal_cancel.cancel();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });

    let mut on_progress = |progress: BatchProgress| {
        if progress.completed % PROGRESS_EVERY == 0 || progress.completed == progress.total {
            info!(
                "Progress: {}/{} (last SKU {}: {:?})",
                progress.completed, progress.total, progress.sku_id, progress.status
            );
        }
    };

    let progress: &mut (dyn FnMut(BatchProgress) + Send) = &mut on_progress;
    let outcome = pricer
        .price_batch(&skus, Some(progress), &cancel)
        .await
        .context("Batch pricing failed")?;

    if outcome.is_cancelled() {
        warn!("Batch cancelled, writing partial results");
    }
    let cache_stats = cache.stats();
    info!(
        "Lookup cache: {} vocabularies, {} market prices",
        cache_stats.vocabularies, cache_stats.market_prices
    );

    let report = outcome.into_report();
    write_report(&config, &report)?;
    print_summary(&report);

    Ok(())
}

fn load_skus(config: &Config) -> Result<Vec<Sku>> {
    let raw = std::fs::read_to_string(&config.sku_file)
        .with_context(|| format!("Failed to read SKU file {}", config.sku_file.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse SKU file {}", config.sku_file.display()))
}

fn write_report(config: &Config, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize results")?;
    std::fs::write(&config.output_file, json)
        .with_context(|| format!("Failed to write {}", config.output_file.display()))?;
    info!("Wrote results to {}", config.output_file.display());
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let stats = &report.stats;
    println!("Batch summary");
    println!("  SKUs:          {}", stats.total);
    println!("  Priced:        {}", stats.processed);
    println!("  Skipped:       {}", stats.skipped);
    println!("  Errors:        {}", stats.errors);
    println!("  With warnings: {}", stats.warnings);
    if stats.cancelled > 0 {
        println!("  Not started:   {}", stats.cancelled);
    }
    println!("  Success rate:  {:.1}%", stats.success_rate * 100.0);
    println!("  Elapsed:       {:.2}s", stats.elapsed_secs);
    println!();
    println!("  {:>4}  {:>14}  {:>12}", "pct", "total value", "median days");
    for aggregate in &report.aggregates {
        let days = aggregate
            .median_time_to_sell_days
            .map(|d| format!("{:.1}", d))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>4}  {:>14.2}  {:>12}",
            aggregate.percentile, aggregate.total_value, days
        );
    }
}
