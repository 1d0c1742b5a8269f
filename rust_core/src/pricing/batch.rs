//! Batch pricing
//!
//! Fans [`SkuPricer`] out over a SKU list with at most `concurrency` SKUs in
//! flight, then reduces the per-SKU results into counts, per-percentile
//! inventory value and per-percentile median time-to-sell.

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::orchestrator::SkuPricer;
use super::{PricingResult, PricingStatus};
use crate::cancellation::CancellationFlag;
use crate::clients::MarketplaceClient;
use crate::config::PricingConfig;
use crate::error::PricingError;
use crate::models::Sku;
use crate::utils::stats::median;

// ============================================================================
// Report Types
// ============================================================================

/// Emitted after each SKU finishes
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub sku_id: u64,
    pub status: PricingStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    /// SKUs that produced a price
    pub processed: usize,
    /// SKUs rejected by validation
    pub skipped: usize,
    /// Fetch failures plus insufficient data
    pub errors: usize,
    /// Priced SKUs whose bound hit the floor or lacked a market price
    pub warnings: usize,
    /// SKUs never started because the batch was cancelled
    pub cancelled: usize,
    pub success_rate: f64,
    pub elapsed_secs: f64,
}

/// Inventory value and velocity at one percentile across the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileAggregate {
    pub percentile: u8,
    /// Σ price × total quantity over priced SKUs
    pub total_value: f64,
    pub median_time_to_sell_days: Option<f64>,
    pub sku_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<PricingResult>,
    pub stats: BatchStats,
    pub aggregates: Vec<PercentileAggregate>,
}

impl BatchReport {
    pub fn aggregate(&self, percentile: u8) -> Option<&PercentileAggregate> {
        self.aggregates.iter().find(|a| a.percentile == percentile)
    }
}

/// A batch either ran to the end or stopped early on cancellation
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed(BatchReport),
    Cancelled(BatchReport),
}

impl BatchOutcome {
    pub fn report(&self) -> &BatchReport {
        match self {
            BatchOutcome::Completed(report) | BatchOutcome::Cancelled(report) => report,
        }
    }

    pub fn into_report(self) -> BatchReport {
        match self {
            BatchOutcome::Completed(report) | BatchOutcome::Cancelled(report) => report,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchOutcome::Cancelled(_))
    }
}

// ============================================================================
// Accumulator
// ============================================================================

#[derive(Debug, Default)]
struct PercentileAccumulator {
    total_value: f64,
    velocities: Vec<f64>,
    sku_count: usize,
}

/// Commutative reduction over completed SKUs
struct BatchAccumulator {
    include_thin_data: bool,
    results: Vec<PricingResult>,
    stats: BatchStats,
    per_percentile: BTreeMap<u8, PercentileAccumulator>,
}

impl BatchAccumulator {
    fn new(total: usize, include_thin_data: bool) -> Self {
        Self {
            include_thin_data,
            results: Vec::with_capacity(total),
            stats: BatchStats {
                total,
                ..Default::default()
            },
            per_percentile: BTreeMap::new(),
        }
    }

    /// Fold one SKU outcome in; `None` when the SKU was never started.
    fn record(
        &mut self,
        sku: &Sku,
        selected_percentile: u8,
        outcome: Result<PricingResult, PricingError>,
    ) -> Option<PricingStatus> {
        let unpriced = |status: PricingStatus, e: &PricingError| {
            PricingResult::unpriced(sku, status, selected_percentile, Some(e.to_string()))
        };

        let result = match outcome {
            Ok(result) => result,
            Err(PricingError::Cancelled) => {
                self.stats.cancelled += 1;
                return None;
            }
            Err(e @ PricingError::Validation(_)) => {
                warn!("Skipping SKU {}: {}", sku.sku_id, e);
                unpriced(PricingStatus::Skipped, &e)
            }
            Err(e @ PricingError::InsufficientData { .. }) => {
                unpriced(PricingStatus::InsufficientData, &e)
            }
            Err(e) => {
                error!("Failed to price SKU {}: {}", sku.sku_id, e);
                unpriced(PricingStatus::Failed, &e)
            }
        };

        let status = result.status;
        match status {
            PricingStatus::Priced => {
                self.stats.processed += 1;
                if result.has_price_warning() {
                    self.stats.warnings += 1;
                }
                self.accumulate(&result);
            }
            PricingStatus::Skipped => self.stats.skipped += 1,
            PricingStatus::InsufficientData | PricingStatus::Failed => self.stats.errors += 1,
        }

        self.results.push(result);
        Some(status)
    }

    fn accumulate(&mut self, result: &PricingResult) {
        let quantity = result.total_quantity() as f64;
        for point in &result.percentiles {
            let entry = self.per_percentile.entry(point.percentile).or_default();
            entry.total_value += point.price * quantity;
            entry.sku_count += 1;

            let velocity = point.historical_velocity;
            if velocity.is_thin() && !self.include_thin_data {
                continue;
            }
            if let Some(days) = velocity.days() {
                entry.velocities.push(days);
            }
        }
    }

    fn finish(mut self, elapsed_secs: f64) -> BatchReport {
        let attempted = self.stats.total.saturating_sub(self.stats.skipped);
        self.stats.success_rate = if attempted == 0 {
            0.0
        } else {
            self.stats.processed as f64 / attempted as f64
        };
        self.stats.elapsed_secs = elapsed_secs;

        let aggregates = self
            .per_percentile
            .into_iter()
            .map(|(percentile, acc)| PercentileAggregate {
                percentile,
                total_value: acc.total_value,
                median_time_to_sell_days: median(acc.velocities),
                sku_count: acc.sku_count,
            })
            .collect();

        BatchReport {
            results: self.results,
            stats: self.stats,
            aggregates,
        }
    }
}

// ============================================================================
// Batch Pricer
// ============================================================================

pub struct BatchPricer {
    pricer: SkuPricer,
}

impl BatchPricer {
    pub fn new(client: Arc<dyn MarketplaceClient>, config: PricingConfig) -> Self {
        Self::from_pricer(SkuPricer::new(client, config))
    }

    pub fn from_pricer(pricer: SkuPricer) -> Self {
        Self { pricer }
    }

    pub fn config(&self) -> &PricingConfig {
        self.pricer.config()
    }

    /// Price every SKU and aggregate.
    ///
    /// Fails only on invalid configuration. Per-SKU errors are folded into
    /// the report. SKUs not yet started when `cancel` is raised are never
    /// fetched. The report comes back as [`BatchOutcome::Cancelled`] only
    /// when at least one SKU was left unpriced that way.
    pub async fn price_batch(
        &self,
        skus: &[Sku],
        mut progress: Option<&mut (dyn FnMut(BatchProgress) + Send)>,
        cancel: &CancellationFlag,
    ) -> Result<BatchOutcome, PricingError> {
        let config = self.pricer.config();
        config.validate()?;

        let started = Instant::now();
        let total = skus.len();
        let selected = config.percentile;
        info!(
            "Pricing {} SKUs via {} (concurrency {}, p{})",
            total,
            self.pricer.client_name(),
            config.concurrency,
            selected
        );

        let pricer = &self.pricer;
        let mut completed = stream::iter(skus.iter())
            .map(move |sku| async move {
                if cancel.is_cancelled() {
                    return (sku, Err(PricingError::Cancelled));
                }
                let outcome = pricer.price_one_sku(sku, cancel).await;
                (sku, outcome)
            })
            .buffer_unordered(config.concurrency);

        let mut acc = BatchAccumulator::new(total, config.include_thin_data_in_median);
        let mut done = 0;
        while let Some((sku, outcome)) = completed.next().await {
            done += 1;
            let status = acc.record(sku, selected, outcome);

            if let (Some(report), Some(status)) = (progress.as_deref_mut(), status) {
                report(BatchProgress {
                    completed: done,
                    total,
                    sku_id: sku.sku_id,
                    status,
                });
            }
        }

        let report = acc.finish(started.elapsed().as_secs_f64());
        let stats = &report.stats;
        info!(
            "Batch finished: {} priced, {} skipped, {} errors, {} warned, {} cancelled ({:.1}% success, {:.2}s)",
            stats.processed,
            stats.skipped,
            stats.errors,
            stats.warnings,
            stats.cancelled,
            stats.success_rate * 100.0,
            stats.elapsed_secs
        );

        // A flag raised after the last SKU finished leaves the batch complete
        if report.stats.cancelled > 0 {
            debug!("Returning partial report for cancelled batch");
            Ok(BatchOutcome::Cancelled(report))
        } else {
            Ok(BatchOutcome::Completed(report))
        }
    }
}
