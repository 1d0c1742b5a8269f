//! Time-decay weighted percentiles.
//!
//! Each observation decays as `0.5^(age / half_life)`; the weighted
//! cumulative distribution over ascending prices is then interpolated
//! linearly to read off any percentile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WeightingMode;
use crate::models::SaleObservation;

const MS_PER_DAY: f64 = 86_400_000.0;

/// One point of the weighted distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrice {
    pub price: f64,
    pub weight: f64,
    pub cumulative_weight: f64,
    /// cumulative_weight / total x 100
    pub percentile: f64,
}

/// Fractional age in days, clamped at zero for timestamps after `now`.
pub fn age_in_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let ms = now.signed_duration_since(timestamp).num_milliseconds();
    (ms as f64 / MS_PER_DAY).max(0.0)
}

/// `0.5^(age / half_life)`
pub fn decay_weight(age_days: f64, half_life_days: f64) -> f64 {
    0.5_f64.powf(age_days / half_life_days)
}

/// Build the weighted distribution sorted by ascending price.
///
/// Returns an empty vector when there are no observations or every weight
/// underflowed to zero.
pub fn weighted_distribution(
    sales: &[SaleObservation],
    half_life_days: f64,
    mode: WeightingMode,
    now: DateTime<Utc>,
) -> Vec<WeightedPrice> {
    if sales.is_empty() || !(half_life_days > 0.0) {
        return Vec::new();
    }

    let mut weighted: Vec<(f64, f64)> = sales
        .iter()
        .map(|sale| {
            let decay = decay_weight(age_in_days(sale.timestamp, now), half_life_days);
            let weight = match mode {
                WeightingMode::DecayTimesQuantity => decay * sale.quantity as f64,
                WeightingMode::DecayOnly => decay,
            };
            (sale.price, weight)
        })
        .collect();

    weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if !(total > 0.0) || !total.is_finite() {
        return Vec::new();
    }

    let mut cumulative = 0.0;
    weighted
        .into_iter()
        .map(|(price, weight)| {
            cumulative += weight;
            WeightedPrice {
                price,
                weight,
                cumulative_weight: cumulative,
                percentile: cumulative / total * 100.0,
            }
        })
        .collect()
}

/// Interpolated price at `percentile` over a distribution from
/// [`weighted_distribution`]. `None` only for an empty distribution.
pub fn price_at(distribution: &[WeightedPrice], percentile: f64) -> Option<f64> {
    let first = distribution.first()?;
    let last = distribution.last()?;

    if percentile <= 0.0 {
        return Some(first.price);
    }
    if percentile >= 100.0 {
        return Some(last.price);
    }

    let total = last.cumulative_weight;
    let target = percentile / 100.0 * total;

    let idx = match distribution.iter().position(|p| p.cumulative_weight >= target) {
        Some(idx) => idx,
        // Rounding left every cumulative weight short of the target
        None => return Some(last.price),
    };

    if idx == 0 {
        return Some(first.price);
    }

    let lower = &distribution[idx - 1];
    let upper = &distribution[idx];
    let gap = upper.cumulative_weight - lower.cumulative_weight;
    if gap <= 0.0 {
        return Some(upper.price);
    }

    let fraction = (target - lower.cumulative_weight) / gap;
    Some(lower.price + (upper.price - lower.price) * fraction)
}

/// Prices for each requested percentile, in request order.
///
/// Empty when the input is empty or the total weight is zero.
pub fn percentile_prices(
    sales: &[SaleObservation],
    half_life_days: f64,
    percentiles: &[u8],
    mode: WeightingMode,
    now: DateTime<Utc>,
) -> Vec<(u8, f64)> {
    let distribution = weighted_distribution(sales, half_life_days, mode, now);
    if distribution.is_empty() {
        return Vec::new();
    }

    percentiles
        .iter()
        .filter_map(|&p| price_at(&distribution, p as f64).map(|price| (p, price)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sale(price: f64, quantity: u32, days_ago: i64) -> SaleObservation {
        SaleObservation::new(
            Condition::NearMint,
            price,
            quantity,
            now() - Duration::days(days_ago),
        )
    }

    fn example_sales() -> Vec<SaleObservation> {
        vec![sale(10.0, 1, 10), sale(12.0, 1, 5), sale(11.0, 2, 1)]
    }

    #[test]
    fn test_decay_weight_halves_at_half_life() {
        assert!((decay_weight(7.0, 7.0) - 0.5).abs() < 1e-12);
        assert!((decay_weight(0.0, 7.0) - 1.0).abs() < 1e-12);
        assert!((decay_weight(28.0, 7.0) - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_future_timestamps_do_not_gain_weight() {
        let future = now() + Duration::days(3);
        assert_eq!(age_in_days(future, now()), 0.0);
    }

    #[test]
    fn test_example_median_quantity_weighted() {
        // weights: 10 -> 0.5^(10/7), 11 -> 2 x 0.5^(1/7), 12 -> 0.5^(5/7)
        let prices = percentile_prices(
            &example_sales(),
            7.0,
            &[50],
            WeightingMode::DecayTimesQuantity,
            now(),
        );
        assert_eq!(prices.len(), 1);
        let (p, price) = prices[0];
        assert_eq!(p, 50);
        assert!((price - 10.565_695_6).abs() < 1e-6, "got {}", price);
        assert!(price > 10.0 && price < 12.0);
    }

    #[test]
    fn test_example_median_decay_only() {
        let prices = percentile_prices(
            &example_sales(),
            7.0,
            &[50],
            WeightingMode::DecayOnly,
            now(),
        );
        assert!((prices[0].1 - 10.631_391_2).abs() < 1e-6, "got {}", prices[0].1);
    }

    #[test]
    fn test_percentiles_are_monotonic() {
        let sales = vec![
            sale(4.0, 1, 30),
            sale(9.5, 3, 2),
            sale(6.25, 1, 12),
            sale(7.0, 2, 0),
            sale(5.0, 1, 45),
            sale(12.0, 1, 8),
        ];
        let percentiles: Vec<u8> = (0..=100).collect();
        let prices = percentile_prices(&sales, 10.0, &percentiles, WeightingMode::DecayTimesQuantity, now());
        assert_eq!(prices.len(), 101);
        assert!(prices.windows(2).all(|w| w[0].1 <= w[1].1 + 1e-12));
        assert_eq!(prices[0].1, 4.0);
        assert_eq!(prices[100].1, 12.0);
    }

    #[test]
    fn test_exact_knot_has_no_interpolation_error() {
        let dist = weighted_distribution(&example_sales(), 7.0, WeightingMode::DecayTimesQuantity, now());
        let knot = dist[1];
        let price = price_at(&dist, knot.percentile).unwrap();
        assert!((price - knot.price).abs() < 1e-9, "got {}", price);
    }

    #[test]
    fn test_single_observation() {
        let sales = vec![sale(3.5, 4, 2)];
        let prices = percentile_prices(&sales, 7.0, &[0, 25, 50, 80, 100], WeightingMode::DecayTimesQuantity, now());
        assert!(prices.iter().all(|(_, price)| *price == 3.5));
    }

    #[test]
    fn test_identical_prices() {
        let sales = vec![sale(2.0, 1, 1), sale(2.0, 5, 20)];
        let prices = percentile_prices(&sales, 7.0, &[10, 50, 90], WeightingMode::DecayTimesQuantity, now());
        assert!(prices.iter().all(|(_, price)| *price == 2.0));
    }

    #[test]
    fn test_empty_and_underflowed_inputs() {
        assert!(percentile_prices(&[], 7.0, &[50], WeightingMode::DecayTimesQuantity, now()).is_empty());

        let ancient = vec![sale(1.0, 1, 36_500)];
        assert!(percentile_prices(&ancient, 0.01, &[50], WeightingMode::DecayTimesQuantity, now()).is_empty());
    }

    #[test]
    fn test_distribution_percentiles_end_at_100() {
        let dist = weighted_distribution(&example_sales(), 7.0, WeightingMode::DecayOnly, now());
        assert_eq!(dist.len(), 3);
        assert!((dist[2].percentile - 100.0).abs() < 1e-9);
        assert!(dist.windows(2).all(|w| w[0].price <= w[1].price));
    }
}
