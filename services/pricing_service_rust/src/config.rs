use anyhow::{anyhow, Context, Result};
use card_pricer_core::config::{HalfLifePolicy, PricingConfig, WeightingMode};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MARKETPLACE_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SKU_FILE: &str = "skus.json";
pub const DEFAULT_OUTPUT_FILE: &str = "pricing_results.json";

#[derive(Clone, Debug)]
pub struct Config {
    pub marketplace_base_url: String,
    pub marketplace_timeout: Duration,
    pub sku_file: PathBuf,
    pub output_file: PathBuf,
    pub pricing: PricingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut pricing = PricingConfig::default();

        if let Some(percentile) = parse_var::<u8>("PRICING_PERCENTILE")? {
            pricing.percentile = percentile;
        }
        pricing.half_life_days = parse_var::<f64>("HALF_LIFE_DAYS")?;
        if let Some(name) = var("HALF_LIFE_POLICY") {
            pricing.half_life_policy = HalfLifePolicy::from_name(&name)
                .ok_or_else(|| anyhow!("HALF_LIFE_POLICY: unknown policy '{}'", name))?;
        }
        if let Some(name) = var("WEIGHTING_MODE") {
            pricing.weighting = WeightingMode::from_name(&name)
                .ok_or_else(|| anyhow!("WEIGHTING_MODE: unknown mode '{}'", name))?;
        }
        if let Some(enabled) = parse_var::<bool>("ENABLE_SUPPLY_ANALYSIS")? {
            pricing.enable_supply_analysis = enabled;
        }
        if let Some(multiplier) = parse_var::<f64>("PRICE_FLOOR_MULTIPLIER")? {
            pricing.price_floor.min_multiplier = multiplier;
        }
        if let Some(constant) = parse_var::<f64>("PRICE_FLOOR_CONSTANT")? {
            pricing.price_floor.min_constant = constant;
        }
        if let Some(concurrency) = parse_var::<usize>("PRICING_CONCURRENCY")? {
            pricing.concurrency = concurrency;
        }

        pricing
            .validate()
            .context("Pricing configuration from environment is invalid")?;

        Ok(Self {
            marketplace_base_url: var("MARKETPLACE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MARKETPLACE_BASE_URL.to_string()),
            marketplace_timeout: Duration::from_secs(
                parse_var::<u64>("MARKETPLACE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            sku_file: var("SKU_FILE")
                .unwrap_or_else(|| DEFAULT_SKU_FILE.to_string())
                .into(),
            output_file: var("OUTPUT_FILE")
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string())
                .into(),
            pricing,
        })
    }
}

/// Non-empty, trimmed value of an environment variable
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Failed to parse {}='{}'", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_reports_key() {
        env::set_var("CARD_PRICER_TEST_PERCENTILE", "eighty");
        let err = parse_var::<u8>("CARD_PRICER_TEST_PERCENTILE").unwrap_err();
        assert!(err.to_string().contains("CARD_PRICER_TEST_PERCENTILE"));
        env::remove_var("CARD_PRICER_TEST_PERCENTILE");
    }

    #[test]
    fn test_blank_var_is_unset() {
        env::set_var("CARD_PRICER_TEST_BLANK", "   ");
        assert_eq!(parse_var::<u8>("CARD_PRICER_TEST_BLANK").unwrap(), None);
        env::remove_var("CARD_PRICER_TEST_BLANK");
    }
}
