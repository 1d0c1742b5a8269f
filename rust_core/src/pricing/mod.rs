//! Pricing Engine
//!
//! Leaf modules are pure numerics (percentiles, half-life, Zipf
//! normalization, time-to-sell); the orchestrator sequences them for one SKU
//! and the batch pricer fans the orchestrator out over many SKUs.

use serde::{Deserialize, Serialize};

use crate::models::{Condition, Sku};

pub mod batch;
pub mod half_life;
pub mod orchestrator;
pub mod percentile;
pub mod time_to_sell;
pub mod zipf;

pub use batch::{
    BatchOutcome, BatchPricer, BatchProgress, BatchReport, BatchStats, PercentileAggregate,
};
pub use orchestrator::SkuPricer;
pub use time_to_sell::TimeToSell;
pub use zipf::{ConditionMultipliers, NormalizationMethod, NormalizationOutcome};

/// Price and velocity at one percentile of the weighted distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentilePoint {
    pub percentile: u8,
    pub price: f64,
    pub historical_velocity: TimeToSell,
    /// Days, when supply analysis ran and had a historical basis
    pub supply_adjusted_days: Option<f64>,
    /// Sales at or above `price`
    pub supporting_sales: usize,
    /// Competing units at or below `price`
    pub supporting_listings: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStatus {
    Priced,
    InsufficientData,
    Failed,
    Skipped,
}

/// Non-fatal annotations on a priced SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingWarning {
    /// Suggested price was raised to the market-price floor
    FloorApplied { suggested: f64, floor: f64 },
    /// No market price reference; suggestion accepted as-is
    MarketPriceMissing,
    /// Sparse target-condition sales were supplemented across conditions
    CrossConditionUsed { target_sales: usize, normalized_sales: usize },
    /// Listings could not be fetched; supply analysis skipped
    ListingsUnavailable { error: String },
    /// A SKU attribute had no filter id and was left unfiltered
    UnmatchedFilter { attribute: String },
}

impl PricingWarning {
    /// Whether the warning concerns the price bound itself.
    ///
    /// Only floor adjustments and missing market prices count towards the
    /// batch warning total; the others describe data sourcing.
    pub fn is_price_warning(&self) -> bool {
        matches!(
            self,
            PricingWarning::FloorApplied { .. } | PricingWarning::MarketPriceMissing
        )
    }
}

/// Outcome of pricing one SKU. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub sku_id: u64,
    pub product_id: u64,
    pub condition: Option<Condition>,
    pub quantity: i64,
    pub add_to_quantity: i64,
    pub status: PricingStatus,
    pub selected_percentile: u8,
    pub suggested_price: Option<f64>,
    pub bounded_price: Option<f64>,
    pub market_price: Option<f64>,
    pub historical_velocity: Option<TimeToSell>,
    pub supply_adjusted_days: Option<f64>,
    pub percentiles: Vec<PercentilePoint>,
    pub sale_count: usize,
    pub listing_count: usize,
    pub half_life_days: Option<f64>,
    pub used_cross_condition: bool,
    pub normalization: Option<NormalizationMethod>,
    pub warnings: Vec<PricingWarning>,
    pub error: Option<String>,
}

impl PricingResult {
    /// Empty result for a SKU that produced no prices
    pub fn unpriced(sku: &Sku, status: PricingStatus, selected_percentile: u8, error: Option<String>) -> Self {
        Self {
            sku_id: sku.sku_id,
            product_id: sku.product_id,
            condition: Condition::from_name(&sku.condition),
            quantity: sku.quantity,
            add_to_quantity: sku.add_to_quantity,
            status,
            selected_percentile,
            suggested_price: None,
            bounded_price: None,
            market_price: None,
            historical_velocity: None,
            supply_adjusted_days: None,
            percentiles: Vec::new(),
            sale_count: 0,
            listing_count: 0,
            half_life_days: None,
            used_cross_condition: false,
            normalization: None,
            warnings: Vec::new(),
            error,
        }
    }

    pub fn total_quantity(&self) -> i64 {
        self.quantity + self.add_to_quantity
    }

    pub fn is_priced(&self) -> bool {
        self.status == PricingStatus::Priced
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_price_warning(&self) -> bool {
        self.warnings.iter().any(PricingWarning::is_price_warning)
    }

    pub fn point(&self, percentile: u8) -> Option<&PercentilePoint> {
        self.percentiles.iter().find(|p| p.percentile == percentile)
    }
}
