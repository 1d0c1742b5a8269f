//! Per-SKU pricing
//!
//! Runs one SKU through filter resolution, sales collection (with the
//! cross-condition path when the target condition is sparse), half-life
//! selection, optional supply analysis, percentile pricing and the market
//! price floor. Each step that touches the marketplace first checks the
//! cancellation flag.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::half_life::resolve_half_life;
use super::percentile::percentile_prices;
use super::time_to_sell::{competing_units, estimate_with_supply, historical_velocity};
use super::zipf::normalize_conditions;
use super::{NormalizationMethod, PercentilePoint, PricingResult, PricingStatus, PricingWarning};
use crate::cancellation::CancellationFlag;
use crate::clients::MarketplaceClient;
use crate::config::PricingConfig;
use crate::error::PricingError;
use crate::models::{Condition, ListingObservation, SaleObservation, Sku};

/// Prices a single SKU against a marketplace
pub struct SkuPricer {
    client: Arc<dyn MarketplaceClient>,
    config: PricingConfig,
    reference_time: Option<DateTime<Utc>>,
}

impl SkuPricer {
    pub fn new(client: Arc<dyn MarketplaceClient>, config: PricingConfig) -> Self {
        Self {
            client,
            config,
            reference_time: None,
        }
    }

    /// Pin "now" for age calculations (tests, replays)
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn client_name(&self) -> &str {
        self.client.client_name()
    }

    fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }

    /// Price one SKU.
    ///
    /// Too little sales history is a normal outcome and comes back as a
    /// result with status `InsufficientData`. Validation problems, failed
    /// sales/vocabulary/market-price fetches and cancellation are errors.
    pub async fn price_one_sku(
        &self,
        sku: &Sku,
        cancel: &CancellationFlag,
    ) -> Result<PricingResult, PricingError> {
        let config = &self.config;
        let now = self.now();

        checkpoint(cancel)?;
        let condition = validate_sku(sku)?;

        // Resolve filters
        checkpoint(cancel)?;
        let vocabulary = self
            .client
            .fetch_filter_vocabulary(sku.category_id)
            .await
            .map_err(|e| PricingError::fetch("filter vocabulary", e))?;
        let resolved = vocabulary.resolve(sku).ok_or_else(|| {
            PricingError::Validation(format!(
                "condition '{}' not offered in category {}",
                sku.condition, sku.category_id
            ))
        })?;

        let mut warnings: Vec<PricingWarning> = resolved
            .unmatched
            .iter()
            .map(|attribute| PricingWarning::UnmatchedFilter {
                attribute: attribute.clone(),
            })
            .collect();

        // Collect sales
        checkpoint(cancel)?;
        let mut sales: Vec<SaleObservation> = self
            .client
            .fetch_sales(sku.product_id, &resolved.filter, config.sales_limit)
            .await
            .map_err(|e| PricingError::fetch("sales", e))?
            .into_iter()
            .filter(SaleObservation::is_usable)
            .collect();
        debug!(
            "SKU {}: {} usable {} sales",
            sku.sku_id,
            sales.len(),
            condition
        );

        let mut normalization = None;
        let mut used_cross_condition = false;

        if sales.len() < config.sparse_threshold {
            checkpoint(cancel)?;
            let cross: Vec<SaleObservation> = self
                .client
                .fetch_sales(
                    sku.product_id,
                    &resolved.filter.any_condition(),
                    config.cross_condition_limit,
                )
                .await
                .map_err(|e| PricingError::fetch("cross-condition sales", e))?
                .into_iter()
                .filter(SaleObservation::is_usable)
                .collect();

            if cross.len() > sales.len() {
                let outcome = normalize_conditions(&cross, condition);
                let normalized: Vec<SaleObservation> = cross
                    .iter()
                    .map(|sale| outcome.multipliers.normalize(sale, condition))
                    .collect();

                debug!(
                    "SKU {}: supplementing {} {} sales with {} cross-condition sales",
                    sku.sku_id,
                    sales.len(),
                    condition,
                    normalized.len()
                );
                warnings.push(PricingWarning::CrossConditionUsed {
                    target_sales: sales.len(),
                    normalized_sales: normalized.len(),
                });
                sales = normalized;
                normalization = Some(outcome.method);
                used_cross_condition = true;
            }
        }

        if sales.len() < config.min_sales {
            debug!(
                "SKU {}: only {} usable sales, need {}",
                sku.sku_id,
                sales.len(),
                config.min_sales
            );
            return Ok(insufficient(
                sku,
                config,
                sales.len(),
                used_cross_condition,
                normalization,
                warnings,
            ));
        }

        // Choose half-life
        let timestamps: Vec<DateTime<Utc>> = sales.iter().map(|s| s.timestamp).collect();
        let half_life = resolve_half_life(config.half_life_days, &timestamps, config.half_life_policy);

        // Collect listings
        let listings: Option<Vec<ListingObservation>> = if config.enable_supply_analysis {
            checkpoint(cancel)?;
            match self
                .client
                .fetch_listings(sku.product_id, &resolved.filter, &config.listing_query())
                .await
            {
                Ok(listings) => Some(listings),
                Err(e) => {
                    warn!(
                        "SKU {}: listings unavailable, using historical velocity only: {:#}",
                        sku.sku_id, e
                    );
                    warnings.push(PricingWarning::ListingsUnavailable {
                        error: format!("{:#}", e),
                    });
                    None
                }
            }
        } else {
            None
        };

        // Compute percentiles
        let prices = percentile_prices(
            &sales,
            half_life,
            &config.percentiles(),
            config.weighting,
            now,
        );
        if prices.is_empty() {
            return Ok(insufficient(
                sku,
                config,
                sales.len(),
                used_cross_condition,
                normalization,
                warnings,
            ));
        }

        let points: Vec<PercentilePoint> = prices
            .into_iter()
            .map(|(percentile, price)| {
                let historical = historical_velocity(&sales, price);
                PercentilePoint {
                    percentile,
                    price,
                    historical_velocity: historical,
                    // Only estimated when supply analysis runs
                    supply_adjusted_days: if config.enable_supply_analysis {
                        estimate_with_supply(
                            historical,
                            listings.as_deref(),
                            price,
                            config.supply_depth_weight,
                            config.verified_sellers_only,
                        )
                    } else {
                        None
                    },
                    supporting_sales: sales.iter().filter(|s| s.price >= price).count(),
                    supporting_listings: listings
                        .as_deref()
                        .map(|l| competing_units(l, price, config.verified_sellers_only))
                        .unwrap_or(0),
                }
            })
            .collect();

        // Select target percentile
        let selected = points
            .iter()
            .find(|p| p.percentile == config.percentile)
            .cloned()
            .ok_or(PricingError::InsufficientData { sales: sales.len() })?;

        // Apply price floor
        checkpoint(cancel)?;
        let market_price = self
            .client
            .fetch_market_price(sku.sku_id)
            .await
            .map_err(|e| PricingError::fetch("market price", e))?
            .and_then(|reference| reference.usable_market_price());

        let suggested = selected.price;
        let bounded = match market_price {
            Some(market) => {
                let floor = config.price_floor.floor_for(market);
                if suggested < floor {
                    warn!(
                        "SKU {}: suggested {:.2} below floor {:.2} (market {:.2}), using floor",
                        sku.sku_id, suggested, floor, market
                    );
                    warnings.push(PricingWarning::FloorApplied { suggested, floor });
                    floor
                } else {
                    suggested
                }
            }
            None => {
                warnings.push(PricingWarning::MarketPriceMissing);
                suggested
            }
        };

        Ok(PricingResult {
            sku_id: sku.sku_id,
            product_id: sku.product_id,
            condition: Some(condition),
            quantity: sku.quantity,
            add_to_quantity: sku.add_to_quantity,
            status: PricingStatus::Priced,
            selected_percentile: config.percentile,
            suggested_price: Some(suggested),
            bounded_price: Some(bounded),
            market_price,
            historical_velocity: Some(selected.historical_velocity),
            supply_adjusted_days: selected.supply_adjusted_days,
            percentiles: points,
            sale_count: sales.len(),
            listing_count: listings.as_ref().map(Vec::len).unwrap_or(0),
            half_life_days: Some(half_life),
            used_cross_condition,
            normalization,
            warnings,
            error: None,
        })
    }
}

fn checkpoint(cancel: &CancellationFlag) -> Result<(), PricingError> {
    if cancel.is_cancelled() {
        Err(PricingError::Cancelled)
    } else {
        Ok(())
    }
}

fn validate_sku(sku: &Sku) -> Result<Condition, PricingError> {
    if sku.sku_id == 0 {
        return Err(PricingError::Validation("sku id must be positive".to_string()));
    }
    if sku.product_id == 0 {
        return Err(PricingError::Validation(format!(
            "SKU {} has no product id",
            sku.sku_id
        )));
    }
    if sku.quantity < 0 || sku.add_to_quantity < 0 {
        return Err(PricingError::Validation(format!(
            "SKU {} has negative quantity ({} + {})",
            sku.sku_id, sku.quantity, sku.add_to_quantity
        )));
    }
    Condition::from_name(&sku.condition).ok_or_else(|| {
        PricingError::Validation(format!(
            "SKU {} has unknown condition '{}'",
            sku.sku_id, sku.condition
        ))
    })
}

fn insufficient(
    sku: &Sku,
    config: &PricingConfig,
    sale_count: usize,
    used_cross_condition: bool,
    normalization: Option<NormalizationMethod>,
    warnings: Vec<PricingWarning>,
) -> PricingResult {
    let mut result = PricingResult::unpriced(
        sku,
        PricingStatus::InsufficientData,
        config.percentile,
        Some(PricingError::InsufficientData { sales: sale_count }.to_string()),
    );
    result.sale_count = sale_count;
    result.used_cross_condition = used_cross_condition;
    result.normalization = normalization;
    result.warnings = warnings;
    result
}
