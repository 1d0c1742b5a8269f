//! Read-through caching for marketplace lookups.
//!
//! Category vocabularies and SKU market prices are stable over a batch run
//! and requested once per SKU, so they are memoized in an explicit
//! [`LookupCache`] owned by whoever builds the batch. Sales and listings
//! always go to the inner client.
//!
//! Concurrent misses for the same key may both reach the inner client; the
//! second insert overwrites the first with the same value.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use super::marketplace::MarketplaceClient;
use crate::models::{
    FilterVocabulary, ListingObservation, ListingQuery, MarketPriceReference, SaleObservation,
    SalesFilter,
};

/// Memoized vocabulary and market-price lookups
#[derive(Debug, Default)]
pub struct LookupCache {
    vocabularies: RwLock<FxHashMap<u32, FilterVocabulary>>,
    market_prices: RwLock<FxHashMap<u64, Option<MarketPriceReference>>>,
}

/// Entry counts, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub vocabularies: usize,
    pub market_prices: usize,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vocabulary(&self, category_id: u32) -> Option<FilterVocabulary> {
        self.vocabularies.read().get(&category_id).cloned()
    }

    pub fn insert_vocabulary(&self, category_id: u32, vocabulary: FilterVocabulary) {
        self.vocabularies.write().insert(category_id, vocabulary);
    }

    /// Outer `None` = not cached; inner `None` = marketplace has no price
    pub fn market_price(&self, sku_id: u64) -> Option<Option<MarketPriceReference>> {
        self.market_prices.read().get(&sku_id).cloned()
    }

    pub fn insert_market_price(&self, sku_id: u64, price: Option<MarketPriceReference>) {
        self.market_prices.write().insert(sku_id, price);
    }

    /// Seed market prices fetched in bulk ahead of a batch
    pub fn preload_market_prices<I>(&self, prices: I)
    where
        I: IntoIterator<Item = (u64, Option<MarketPriceReference>)>,
    {
        let mut cache = self.market_prices.write();
        for (sku_id, price) in prices {
            cache.insert(sku_id, price);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            vocabularies: self.vocabularies.read().len(),
            market_prices: self.market_prices.read().len(),
        }
    }

    pub fn clear(&self) {
        self.vocabularies.write().clear();
        self.market_prices.write().clear();
    }
}

/// A marketplace client that consults a [`LookupCache`] first
pub struct CachedMarketplace<C> {
    inner: C,
    cache: Arc<LookupCache>,
    name: String,
}

impl<C: MarketplaceClient> CachedMarketplace<C> {
    pub fn new(inner: C, cache: Arc<LookupCache>) -> Self {
        let name = format!("Cached({})", inner.client_name());
        Self { inner, cache, name }
    }

    pub fn cache(&self) -> &Arc<LookupCache> {
        &self.cache
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: MarketplaceClient> MarketplaceClient for CachedMarketplace<C> {
    fn client_name(&self) -> &str {
        &self.name
    }

    async fn fetch_sales(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        limit: u32,
    ) -> Result<Vec<SaleObservation>> {
        self.inner.fetch_sales(product_id, filter, limit).await
    }

    async fn fetch_listings(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        query: &ListingQuery,
    ) -> Result<Vec<ListingObservation>> {
        self.inner.fetch_listings(product_id, filter, query).await
    }

    async fn fetch_market_price(&self, sku_id: u64) -> Result<Option<MarketPriceReference>> {
        if let Some(cached) = self.cache.market_price(sku_id) {
            debug!("Cache hit for market price of SKU {}", sku_id);
            return Ok(cached);
        }

        let price = self.inner.fetch_market_price(sku_id).await?;
        self.cache.insert_market_price(sku_id, price.clone());
        Ok(price)
    }

    async fn fetch_filter_vocabulary(&self, category_id: u32) -> Result<FilterVocabulary> {
        if let Some(cached) = self.cache.vocabulary(category_id) {
            debug!("Cache hit for category {} vocabulary", category_id);
            return Ok(cached);
        }

        let vocabulary = self.inner.fetch_filter_vocabulary(category_id).await?;
        self.cache.insert_vocabulary(category_id, vocabulary.clone());
        Ok(vocabulary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingClient {
        vocab_calls: AtomicU32,
        price_calls: AtomicU32,
    }

    #[async_trait]
    impl MarketplaceClient for CountingClient {
        fn client_name(&self) -> &str {
            "Counting"
        }

        async fn fetch_sales(&self, _: u64, _: &SalesFilter, _: u32) -> Result<Vec<SaleObservation>> {
            Ok(Vec::new())
        }

        async fn fetch_listings(
            &self,
            _: u64,
            _: &SalesFilter,
            _: &ListingQuery,
        ) -> Result<Vec<ListingObservation>> {
            Ok(Vec::new())
        }

        async fn fetch_market_price(&self, sku_id: u64) -> Result<Option<MarketPriceReference>> {
            self.price_calls.fetch_add(1, Ordering::SeqCst);
            if sku_id == 0 {
                return Ok(None);
            }
            Ok(Some(MarketPriceReference {
                market_price: Some(sku_id as f64),
                ..Default::default()
            }))
        }

        async fn fetch_filter_vocabulary(&self, _: u32) -> Result<FilterVocabulary> {
            self.vocab_calls.fetch_add(1, Ordering::SeqCst);
            Ok(FilterVocabulary::from_pairs(
                vec![("Near Mint".to_string(), 1)],
                Vec::new(),
                Vec::new(),
            ))
        }
    }

    #[tokio::test]
    async fn test_vocabulary_fetched_once() {
        let cache = Arc::new(LookupCache::new());
        let client = CachedMarketplace::new(CountingClient::default(), cache.clone());

        for _ in 0..3 {
            let vocab = client.fetch_filter_vocabulary(7).await.unwrap();
            assert_eq!(vocab.conditions.len(), 1);
        }
        assert_eq!(client.inner().vocab_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().vocabularies, 1);
        assert_eq!(client.client_name(), "Cached(Counting)");
    }

    #[tokio::test]
    async fn test_missing_market_price_is_cached() {
        let cache = Arc::new(LookupCache::new());
        let client = CachedMarketplace::new(CountingClient::default(), cache);

        assert!(client.fetch_market_price(0).await.unwrap().is_none());
        assert!(client.fetch_market_price(0).await.unwrap().is_none());
        assert_eq!(client.inner().price_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preloaded_prices_skip_inner_client() {
        let cache = Arc::new(LookupCache::new());
        cache.preload_market_prices(vec![(
            5,
            Some(MarketPriceReference {
                market_price: Some(1.25),
                ..Default::default()
            }),
        )]);
        let client = CachedMarketplace::new(CountingClient::default(), cache.clone());

        let price = tokio_test::block_on(client.fetch_market_price(5)).unwrap().unwrap();
        assert_eq!(price.market_price, Some(1.25));
        assert_eq!(client.inner().price_calls.load(Ordering::SeqCst), 0);

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
