//! Marketplace Collaborator Trait
//!
//! Defines the data the pricing engine needs from the marketplace.
//! Implementations include the HTTP client and the caching wrapper; tests
//! use in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{
    FilterVocabulary, ListingObservation, ListingQuery, MarketPriceReference, SaleObservation,
    SalesFilter,
};

/// Common interface for marketplace data sources
///
/// Implementations must be Send + Sync for use across concurrent SKU tasks.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Display name for logging
    fn client_name(&self) -> &str;

    /// Most recent sales for a product, newest first, at most `limit`
    async fn fetch_sales(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        limit: u32,
    ) -> Result<Vec<SaleObservation>>;

    /// Current listings for a product
    async fn fetch_listings(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        query: &ListingQuery,
    ) -> Result<Vec<ListingObservation>>;

    /// Market price reference for one SKU; `None` when the marketplace has none
    async fn fetch_market_price(&self, sku_id: u64) -> Result<Option<MarketPriceReference>>;

    /// Condition/language/variant filter ids for a category
    async fn fetch_filter_vocabulary(&self, category_id: u32) -> Result<FilterVocabulary>;
}

#[async_trait]
impl<T: MarketplaceClient + ?Sized> MarketplaceClient for Arc<T> {
    fn client_name(&self) -> &str {
        (**self).client_name()
    }

    async fn fetch_sales(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        limit: u32,
    ) -> Result<Vec<SaleObservation>> {
        (**self).fetch_sales(product_id, filter, limit).await
    }

    async fn fetch_listings(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        query: &ListingQuery,
    ) -> Result<Vec<ListingObservation>> {
        (**self).fetch_listings(product_id, filter, query).await
    }

    async fn fetch_market_price(&self, sku_id: u64) -> Result<Option<MarketPriceReference>> {
        (**self).fetch_market_price(sku_id).await
    }

    async fn fetch_filter_vocabulary(&self, category_id: u32) -> Result<FilterVocabulary> {
        (**self).fetch_filter_vocabulary(category_id).await
    }
}
