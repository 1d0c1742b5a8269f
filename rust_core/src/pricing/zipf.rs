//! Cross-condition price normalization.
//!
//! Fits `price = a / rank^b` across condition ranks with a bounded
//! Levenberg-Marquardt solver and turns the curve into per-condition
//! multipliers onto the target condition's price scale. Falls back to a
//! simple mean-ratio table when data is thin or the solver fails.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::error::ZipfFitError;
use crate::models::{Condition, SaleObservation};
use crate::utils::stats::median;

/// Below this many (rank, price) points the curve is not fitted
pub const MIN_FIT_POINTS: usize = 3;

const MAX_ITERATIONS: usize = 200;
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;
const TOLERANCE: f64 = 1e-12;
const DIAG_EPSILON: f64 = 1e-12;

/// Multiplier per condition grade, indexed by rank - 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionMultipliers([f64; 5]);

impl ConditionMultipliers {
    pub fn identity() -> Self {
        Self([1.0; 5])
    }

    pub fn get(&self, condition: Condition) -> f64 {
        self.0[condition.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Condition, f64)> + '_ {
        Condition::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// Rescale a sale onto the target condition's price level.
    pub fn normalize(&self, sale: &SaleObservation, target: Condition) -> SaleObservation {
        SaleObservation {
            condition: target,
            price: sale.price * self.get(sale.condition),
            quantity: sale.quantity,
            timestamp: sale.timestamp,
        }
    }

    fn from_fn(f: impl Fn(Condition) -> f64) -> Self {
        let mut values = [1.0; 5];
        for condition in Condition::ALL {
            let value = f(condition);
            values[condition.index()] = if value.is_finite() && value > 0.0 { value } else { 1.0 };
        }
        Self(values)
    }
}

/// Fitted curve parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZipfFit {
    pub a: f64,
    pub b: f64,
    pub iterations: usize,
    pub sse: f64,
}

impl ZipfFit {
    pub fn predict(&self, rank: f64) -> f64 {
        self.a / rank.powf(self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    TooFewPoints { points: usize },
    FitFailed { error: String },
}

/// Which path produced the multiplier table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum NormalizationMethod {
    Fitted { a: f64, b: f64, iterations: usize },
    RatioFallback(FallbackReason),
}

impl NormalizationMethod {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::RatioFallback(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    pub target: Condition,
    pub multipliers: ConditionMultipliers,
    pub method: NormalizationMethod,
}

/// Build a multiplier table mapping every condition onto `target`.
///
/// Never fails: solver problems downgrade to the ratio method.
pub fn normalize_conditions(sales: &[SaleObservation], target: Condition) -> NormalizationOutcome {
    let points: Vec<(f64, f64)> = sales
        .iter()
        .filter(|s| s.price > 0.0 && s.price.is_finite())
        .map(|s| (s.condition.rank() as f64, s.price))
        .collect();

    if points.len() < MIN_FIT_POINTS {
        debug!(
            "Only {} priced sales, using ratio normalization onto {}",
            points.len(),
            target
        );
        return NormalizationOutcome {
            target,
            multipliers: ratio_multipliers(sales, target),
            method: NormalizationMethod::RatioFallback(FallbackReason::TooFewPoints {
                points: points.len(),
            }),
        };
    }

    let rank_one = median(points.iter().filter(|(r, _)| *r == 1.0).map(|(_, p)| *p));
    let start_a = rank_one
        .or_else(|| median(points.iter().map(|(_, p)| *p)))
        .unwrap_or(1.0);

    match fit_zipf(&points, start_a, 0.0) {
        Ok(fit) => {
            let target_price = fit.predict(target.rank() as f64);
            let multipliers = ConditionMultipliers::from_fn(|condition| {
                let predicted = fit.predict(condition.rank() as f64);
                if target_price > 0.0 && predicted > 0.0 {
                    target_price / predicted
                } else {
                    1.0
                }
            });
            debug!(
                "Zipf fit a={:.4} b={:.4} after {} iterations (sse {:.4})",
                fit.a, fit.b, fit.iterations, fit.sse
            );
            NormalizationOutcome {
                target,
                multipliers,
                method: NormalizationMethod::Fitted {
                    a: fit.a,
                    b: fit.b,
                    iterations: fit.iterations,
                },
            }
        }
        Err(e) => {
            warn!("Zipf fit failed ({}), falling back to ratio normalization", e);
            NormalizationOutcome {
                target,
                multipliers: ratio_multipliers(sales, target),
                method: NormalizationMethod::RatioFallback(FallbackReason::FitFailed {
                    error: e.to_string(),
                }),
            }
        }
    }
}

/// targetMean / gradeMean per condition; 1.0 where either mean is missing.
pub fn ratio_multipliers(sales: &[SaleObservation], target: Condition) -> ConditionMultipliers {
    let mean_for = |condition: Condition| -> Option<f64> {
        let prices: Vec<f64> = sales
            .iter()
            .filter(|s| s.condition == condition && s.price > 0.0 && s.price.is_finite())
            .map(|s| s.price)
            .collect();
        if prices.is_empty() {
            None
        } else {
            Some(prices.mean())
        }
    };

    let target_mean = match mean_for(target) {
        Some(mean) => mean,
        None => return ConditionMultipliers::identity(),
    };

    ConditionMultipliers::from_fn(|condition| match mean_for(condition) {
        Some(mean) if mean > 0.0 => target_mean / mean,
        _ => 1.0,
    })
}

/// Least-squares fit of `y = a / x^b` with `a, b >= 0`.
pub fn fit_zipf(points: &[(f64, f64)], start_a: f64, start_b: f64) -> Result<ZipfFit, ZipfFitError> {
    let sse_at = |a: f64, b: f64| -> f64 {
        points
            .iter()
            .map(|(x, y)| {
                let r = y - a / x.powf(b);
                r * r
            })
            .sum()
    };

    let mut a = start_a.max(0.0);
    let mut b = start_b.max(0.0);
    let mut sse = sse_at(a, b);
    if !sse.is_finite() {
        return Err(ZipfFitError::NonFinite(0));
    }
    let mut damping = INITIAL_DAMPING;

    for iteration in 1..=MAX_ITERATIONS {
        if sse == 0.0 {
            return Ok(ZipfFit { a, b, iterations: iteration - 1, sse });
        }

        // Normal equations J^T J and J^T r
        let (mut jaa, mut jab, mut jbb, mut ga, mut gb) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for (x, y) in points {
            let basis = x.powf(-b);
            let da = basis;
            let db = -a * basis * x.ln();
            let residual = y - a * basis;
            jaa += da * da;
            jab += da * db;
            jbb += db * db;
            ga += da * residual;
            gb += db * residual;
        }
        if ![jaa, jab, jbb, ga, gb].iter().all(|v| v.is_finite()) {
            return Err(ZipfFitError::NonFinite(iteration));
        }

        let m00 = jaa + damping * jaa.max(DIAG_EPSILON);
        let m11 = jbb + damping * jbb.max(DIAG_EPSILON);
        let det = m00 * m11 - jab * jab;
        if !det.is_finite() || det <= 0.0 {
            return Err(ZipfFitError::Singular);
        }

        let step_a = (m11 * ga - jab * gb) / det;
        let step_b = (m00 * gb - jab * ga) / det;
        let next_a = (a + step_a).max(0.0);
        let next_b = (b + step_b).max(0.0);
        let next_sse = sse_at(next_a, next_b);
        if !next_sse.is_finite() {
            return Err(ZipfFitError::NonFinite(iteration));
        }

        if next_sse < sse {
            let improvement = (sse - next_sse) / sse.max(f64::MIN_POSITIVE);
            let step_norm = ((next_a - a).powi(2) + (next_b - b).powi(2)).sqrt();
            a = next_a;
            b = next_b;
            sse = next_sse;
            damping = (damping / 10.0).max(f64::MIN_POSITIVE);
            if improvement < TOLERANCE || step_norm < TOLERANCE {
                return Ok(ZipfFit { a, b, iterations: iteration, sse });
            }
        } else {
            damping *= 10.0;
            if damping > MAX_DAMPING {
                // No descent direction left: current point is a minimum
                return Ok(ZipfFit { a, b, iterations: iteration, sse });
            }
        }
    }

    Err(ZipfFitError::NoConvergence(MAX_ITERATIONS))
}
