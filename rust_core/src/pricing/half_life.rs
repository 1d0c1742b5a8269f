//! Dynamic half-life selection.

use chrono::{DateTime, Utc};

use crate::config::HalfLifePolicy;

/// Used when there are too few sales to measure a span
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 7.0;
pub const MIN_HALF_LIFE_DAYS: f64 = 1.0;
pub const MAX_SPAN_HALF_LIFE_DAYS: f64 = 90.0;

const SECS_PER_DAY: f64 = 86_400.0;

/// Derive a half-life in days from sale timestamps.
pub fn estimate_half_life(timestamps: &[DateTime<Utc>], policy: HalfLifePolicy) -> f64 {
    if timestamps.len() <= 1 {
        return DEFAULT_HALF_LIFE_DAYS;
    }

    let oldest = timestamps.iter().min();
    let newest = timestamps.iter().max();
    let span_days = match (oldest, newest) {
        (Some(oldest), Some(newest)) => {
            newest.signed_duration_since(*oldest).num_seconds() as f64 / SECS_PER_DAY
        }
        _ => return DEFAULT_HALF_LIFE_DAYS,
    };

    match policy {
        HalfLifePolicy::SpanQuarter => {
            // Oldest sale lands at four half-lives (1/16 weight)
            let clamped = (span_days / 4.0).clamp(MIN_HALF_LIFE_DAYS, MAX_SPAN_HALF_LIFE_DAYS);
            (clamped * 10.0).round() / 10.0
        }
        HalfLifePolicy::IntervalScaled => {
            let avg_interval = span_days / (timestamps.len() - 1) as f64;
            (24.0 * avg_interval).max(MIN_HALF_LIFE_DAYS)
        }
    }
}

/// Configured half-life wins; otherwise estimate from the sales.
pub fn resolve_half_life(
    configured: Option<f64>,
    timestamps: &[DateTime<Utc>],
    policy: HalfLifePolicy,
) -> f64 {
    match configured {
        Some(days) if days > 0.0 => days,
        _ => estimate_half_life(timestamps, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn days_ago(days: &[i64]) -> Vec<DateTime<Utc>> {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        days.iter().map(|d| now - Duration::days(*d)).collect()
    }

    #[test]
    fn test_too_few_sales_use_default() {
        for policy in [HalfLifePolicy::SpanQuarter, HalfLifePolicy::IntervalScaled] {
            assert_eq!(estimate_half_life(&[], policy), DEFAULT_HALF_LIFE_DAYS);
            assert_eq!(estimate_half_life(&days_ago(&[3]), policy), DEFAULT_HALF_LIFE_DAYS);
        }
    }

    #[test]
    fn test_span_quarter() {
        assert_eq!(estimate_half_life(&days_ago(&[0, 10, 40]), HalfLifePolicy::SpanQuarter), 10.0);
        // 13 / 4 = 3.25 -> one decimal
        assert_eq!(estimate_half_life(&days_ago(&[13, 0]), HalfLifePolicy::SpanQuarter), 3.3);
    }

    #[test]
    fn test_span_quarter_bounds() {
        assert_eq!(estimate_half_life(&days_ago(&[0, 1]), HalfLifePolicy::SpanQuarter), 1.0);
        assert_eq!(estimate_half_life(&days_ago(&[0, 0, 0]), HalfLifePolicy::SpanQuarter), 1.0);
        assert_eq!(estimate_half_life(&days_ago(&[0, 1000]), HalfLifePolicy::SpanQuarter), 90.0);

        for span in [0, 2, 17, 120, 361, 5000] {
            let hl = estimate_half_life(&days_ago(&[0, span]), HalfLifePolicy::SpanQuarter);
            assert!((MIN_HALF_LIFE_DAYS..=MAX_SPAN_HALF_LIFE_DAYS).contains(&hl));
        }
    }

    #[test]
    fn test_interval_scaled() {
        // 3 sales over 4 days: avg interval 2 days -> 48 days
        assert_eq!(estimate_half_life(&days_ago(&[0, 1, 4]), HalfLifePolicy::IntervalScaled), 48.0);
        // Same-instant sales floor at one day
        assert_eq!(estimate_half_life(&days_ago(&[2, 2]), HalfLifePolicy::IntervalScaled), 1.0);
        // Uncapped above
        assert!(estimate_half_life(&days_ago(&[0, 400]), HalfLifePolicy::IntervalScaled) > 90.0);
    }

    #[test]
    fn test_configured_half_life_wins() {
        let ts = days_ago(&[0, 40]);
        assert_eq!(resolve_half_life(Some(3.0), &ts, HalfLifePolicy::SpanQuarter), 3.0);
        assert_eq!(resolve_half_life(None, &ts, HalfLifePolicy::SpanQuarter), 10.0);
    }
}
