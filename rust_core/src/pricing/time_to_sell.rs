//! Time-to-sell estimation.
//!
//! Historical velocity is the median gap between consecutive sales at or
//! above a price. The supply-adjusted figure stretches that interval by the
//! number of cheaper competing units a buyer would reach first.

use serde::{Deserialize, Serialize};
use crate::models::{ListingObservation, SaleObservation};
use crate::utils::stats::median;

/// Estimate returned when exactly one sale supports a price
pub const THIN_DATA_DAYS: f64 = 90.0;

const SECS_PER_DAY: f64 = 86_400.0;

/// Expected interval between sales at a given price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeToSell {
    /// No sale at or above the price
    Unknown,
    /// Exactly one qualifying sale; conservative fixed estimate
    ThinData { days: f64 },
    /// Median gap between qualifying sales
    Median { days: f64 },
}

impl TimeToSell {
    pub fn days(&self) -> Option<f64> {
        match self {
            TimeToSell::Unknown => None,
            TimeToSell::ThinData { days } | TimeToSell::Median { days } => Some(*days),
        }
    }

    pub fn is_thin(&self) -> bool {
        matches!(self, TimeToSell::ThinData { .. })
    }
}

/// Historical velocity at `target_price` from (normalized) sales.
pub fn historical_velocity(sales: &[SaleObservation], target_price: f64) -> TimeToSell {
    let mut qualifying: Vec<_> = sales
        .iter()
        .filter(|s| s.price >= target_price)
        .map(|s| s.timestamp)
        .collect();

    match qualifying.len() {
        0 => TimeToSell::Unknown,
        1 => TimeToSell::ThinData {
            days: THIN_DATA_DAYS,
        },
        _ => {
            qualifying.sort();
            let gaps = qualifying
                .windows(2)
                .map(|w| w[1].signed_duration_since(w[0]).num_seconds() as f64 / SECS_PER_DAY);
            match median(gaps) {
                Some(days) => TimeToSell::Median { days },
                None => TimeToSell::Unknown,
            }
        }
    }
}

/// Units listed at or below `target_price` (price + shipping).
pub fn competing_units(listings: &[ListingObservation], target_price: f64, verified_only: bool) -> u32 {
    listings
        .iter()
        .filter(|l| !verified_only || l.verified_seller)
        .filter(|l| l.total_cost() <= target_price)
        .map(|l| l.quantity)
        .sum()
}

/// Blend historical velocity with competing supply.
///
/// `days = base x (1 + depth_weight x competing_units)`; never shorter than
/// the historical figure. `None` when there is no historical basis.
pub fn supply_adjusted_velocity(
    historical: TimeToSell,
    competing_units: u32,
    depth_weight: f64,
) -> Option<f64> {
    let base = historical.days()?;
    Some(base * (1.0 + depth_weight.max(0.0) * competing_units as f64))
}

/// Supply-adjusted estimate from optional listings.
///
/// Without listings the historical figure is returned unchanged.
pub fn estimate_with_supply(
    historical: TimeToSell,
    listings: Option<&[ListingObservation]>,
    target_price: f64,
    depth_weight: f64,
    verified_only: bool,
) -> Option<f64> {
    match listings {
        Some(listings) => {
            let units = competing_units(listings, target_price, verified_only);
            supply_adjusted_velocity(historical, units, depth_weight)
        }
        None => historical.days(),
    }
}
