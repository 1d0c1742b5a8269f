//! Pricing configuration.
//!
//! One explicit struct carries every tunable; optional behaviour is an
//! `Option` field rather than a separate entry point.

use serde::{Deserialize, Serialize};

use crate::error::PricingError;
use crate::models::ListingQuery;

/// Decile steps always reported alongside the selected percentile
pub const STANDARD_PERCENTILES: [u8; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// How a dynamic half-life is derived when none is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfLifePolicy {
    /// Span between oldest and newest sale / 4, clamped to [1, 90] days
    #[default]
    SpanQuarter,
    /// 24 x average inter-sale interval, floored at 1 day
    IntervalScaled,
}

impl HalfLifePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "span_quarter" | "span" | "a" => Some(Self::SpanQuarter),
            "interval_scaled" | "interval" | "b" => Some(Self::IntervalScaled),
            _ => None,
        }
    }
}

/// How each sale contributes to the weighted distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMode {
    /// decay x quantity (bulk-purchase aware)
    #[default]
    DecayTimesQuantity,
    /// decay only; per-unit price discovery
    DecayOnly,
}

impl WeightingMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "decay_times_quantity" | "quantity" => Some(Self::DecayTimesQuantity),
            "decay_only" | "unit" => Some(Self::DecayOnly),
            _ => None,
        }
    }
}

/// Lower bound derived from the market price reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFloorConfig {
    pub min_multiplier: f64,
    pub min_constant: f64,
}

impl Default for PriceFloorConfig {
    fn default() -> Self {
        Self {
            min_multiplier: 0.8,
            min_constant: 0.0,
        }
    }
}

impl PriceFloorConfig {
    /// floor = market x multiplier - constant
    pub fn floor_for(&self, market_price: f64) -> f64 {
        market_price * self.min_multiplier - self.min_constant
    }
}

/// Pricing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Percentile whose price becomes the suggestion (0-100)
    pub percentile: u8,
    /// Fixed half-life in days; derived from the sales when `None`
    pub half_life_days: Option<f64>,
    pub half_life_policy: HalfLifePolicy,
    pub weighting: WeightingMode,
    /// Fetch current listings and compute supply-adjusted time-to-sell
    pub enable_supply_analysis: bool,
    /// Extra interval fraction per competing unit
    pub supply_depth_weight: f64,
    /// Only count listings from verified sellers as competing supply
    pub verified_sellers_only: bool,
    /// Sales fetched for the exact condition
    pub sales_limit: u32,
    /// Fewer target-condition sales than this triggers cross-condition pricing
    pub sparse_threshold: usize,
    /// Sales fetched across all conditions on the sparse path
    pub cross_condition_limit: u32,
    /// Minimum usable sales after normalization
    pub min_sales: usize,
    pub price_floor: PriceFloorConfig,
    /// Count one-sale 90 day estimates in the batch median pool
    pub include_thin_data_in_median: bool,
    /// Max SKUs in flight during a batch
    pub concurrency: usize,
    pub listing_page_size: u32,
    pub listing_max_pages: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            percentile: 80,
            half_life_days: None,
            half_life_policy: HalfLifePolicy::SpanQuarter,
            weighting: WeightingMode::DecayTimesQuantity,
            enable_supply_analysis: false,
            supply_depth_weight: 1.0,
            verified_sellers_only: false,
            sales_limit: 50,
            sparse_threshold: 5,
            cross_condition_limit: 100,
            min_sales: 2,
            price_floor: PriceFloorConfig::default(),
            include_thin_data_in_median: false,
            concurrency: 8,
            listing_page_size: 50,
            listing_max_pages: 4,
        }
    }
}

impl PricingConfig {
    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), PricingError> {
        let invalid = |msg: String| Err(PricingError::InvalidConfig(msg));

        if self.percentile > 100 {
            return invalid(format!("percentile {} outside 0-100", self.percentile));
        }
        if let Some(hl) = self.half_life_days {
            if !hl.is_finite() || hl <= 0.0 {
                return invalid(format!("half_life_days must be positive, got {}", hl));
            }
        }
        if !self.supply_depth_weight.is_finite() || self.supply_depth_weight < 0.0 {
            return invalid(format!(
                "supply_depth_weight must be >= 0, got {}",
                self.supply_depth_weight
            ));
        }
        if !self.price_floor.min_multiplier.is_finite() || self.price_floor.min_multiplier < 0.0 {
            return invalid(format!(
                "price floor multiplier must be >= 0, got {}",
                self.price_floor.min_multiplier
            ));
        }
        if !self.price_floor.min_constant.is_finite() {
            return invalid("price floor constant must be finite".to_string());
        }
        if self.sales_limit == 0 || self.cross_condition_limit == 0 {
            return invalid("sales limits must be positive".to_string());
        }
        if self.min_sales == 0 {
            return invalid("min_sales must be at least 1".to_string());
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if self.enable_supply_analysis && (self.listing_page_size == 0 || self.listing_max_pages == 0) {
            return invalid("listing pagination must be positive".to_string());
        }
        Ok(())
    }

    /// Standard deciles plus the selected percentile, ascending and unique.
    pub fn percentiles(&self) -> Vec<u8> {
        let mut percentiles = STANDARD_PERCENTILES.to_vec();
        if !percentiles.contains(&self.percentile) {
            percentiles.push(self.percentile);
        }
        percentiles.sort_unstable();
        percentiles
    }

    pub fn listing_query(&self) -> ListingQuery {
        ListingQuery {
            page_size: self.listing_page_size,
            max_pages: self.listing_max_pages,
        }
    }
}
