use thiserror::Error;

/// Errors surfaced by the pricing engine.
#[derive(Error, Debug)]
pub enum PricingError {
    /// Too few usable sales for any pricing to proceed
    #[error("Insufficient data: {sales} usable sales")]
    InsufficientData { sales: usize },

    /// A marketplace collaborator failed
    #[error("Failed to fetch {what}: {source:#}")]
    Fetch {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed SKU identifier, condition or quantity
    #[error("Invalid SKU: {0}")]
    Validation(String),

    /// Cooperative cancellation was observed
    #[error("Pricing cancelled")]
    Cancelled,

    /// Configuration rejected before any work started
    #[error("Invalid pricing config: {0}")]
    InvalidConfig(String),
}

impl PricingError {
    pub fn fetch(what: &'static str, source: anyhow::Error) -> Self {
        Self::Fetch { what, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Reasons the Zipf solver gave up. Never escapes the normalizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZipfFitError {
    #[error("Residuals became non-finite at iteration {0}")]
    NonFinite(usize),
    #[error("Normal equations are singular")]
    Singular,
    #[error("No convergence after {0} iterations")]
    NoConvergence(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message_includes_source() {
        let err = PricingError::fetch("sales", anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "Failed to fetch sales: connection refused");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled() {
        assert!(PricingError::Cancelled.is_cancelled());
    }
}
