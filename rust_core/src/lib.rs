//! Card Pricer Core - statistical pricing for trading-card inventory.
//!
//! This crate provides:
//! - Time-decay weighted percentile pricing over marketplace sales
//! - Dynamic half-life estimation from sale timestamps
//! - Cross-condition normalization via a Zipf curve fit
//! - Historical and supply-adjusted time-to-sell estimates
//! - Per-SKU orchestration and bounded-concurrency batch aggregation
//! - Marketplace client trait, HTTP client and read-through lookup cache

pub mod cancellation;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod pricing;
pub mod utils;

pub use cancellation::CancellationFlag;
pub use clients::{CachedMarketplace, LookupCache, MarketplaceClient, MarketplaceHttpClient};
pub use config::{HalfLifePolicy, PriceFloorConfig, PricingConfig, WeightingMode};
pub use error::PricingError;
pub use models::{
    Condition, FilterVocabulary, ListingObservation, MarketPriceReference, SaleObservation,
    SalesFilter, Sku,
};
pub use pricing::{
    BatchOutcome, BatchPricer, BatchProgress, BatchReport, PercentilePoint, PricingResult,
    PricingStatus, PricingWarning, SkuPricer, TimeToSell,
};
