//! Small order-statistic helpers shared by the pricing modules.

use statrs::statistics::{Data, Median};

/// Median of the finite values; `None` when there are none.
///
/// Even counts average the middle pair.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(Data::new(finite).median())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(Vec::new()), None);
        assert_eq!(median(vec![4.0]), Some(4.0));
        assert_eq!(median(vec![9.0, 1.0, 5.0]), Some(5.0));
        assert_eq!(median(vec![1.0, 2.0, 3.0, 10.0]), Some(2.5));
    }

    #[test]
    fn test_median_ignores_non_finite() {
        assert_eq!(median(vec![f64::INFINITY, 2.0, f64::NAN]), Some(2.0));
        assert_eq!(median(vec![f64::INFINITY]), None);
    }
}
