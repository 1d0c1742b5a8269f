//! Marketplace HTTP Client
//!
//! JSON client for the marketplace endpoints the pricing engine consumes:
//! latest sales (paginated POST), current listings (paginated POST),
//! SKU market prices and category filter manifests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::marketplace::MarketplaceClient;
use crate::models::{
    Condition, FilterVocabulary, ListingObservation, ListingQuery, MarketPriceReference,
    SaleObservation, SalesFilter,
};
use crate::utils::retry::{fetch_with_retry, RetryPolicy};

/// Largest page the latest-sales endpoint serves
const SALES_PAGE_SIZE: u32 = 25;

/// Marketplace API client
pub struct MarketplaceHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl MarketplaceHttpClient {
    /// Create a client against `base_url` with a 30 second timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("CardPricer/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, url: &str, body: &B, what: &str) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        fetch_with_retry(
            move || async move {
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch {}", what))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(anyhow!("Marketplace API error: {} - {}", status, body));
                }

                response
                    .json::<R>()
                    .await
                    .with_context(|| format!("Failed to parse {} response", what))
            },
            self.retry,
            what,
        )
        .await
    }

    /// GET returning `None` on 404
    async fn get_json<R>(&self, url: &str, what: &str) -> Result<Option<R>>
    where
        R: DeserializeOwned + Send,
    {
        fetch_with_retry(
            move || async move {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch {}", what))?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(anyhow!("Marketplace API error: {} - {}", status, body));
                }

                let parsed = response
                    .json::<R>()
                    .await
                    .with_context(|| format!("Failed to parse {} response", what))?;
                Ok(Some(parsed))
            },
            self.retry,
            what,
        )
        .await
    }
}

#[async_trait]
impl MarketplaceClient for MarketplaceHttpClient {
    fn client_name(&self) -> &str {
        "MarketplaceHttp"
    }

    async fn fetch_sales(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        limit: u32,
    ) -> Result<Vec<SaleObservation>> {
        let url = format!("{}/product/{}/latestsales", self.base_url, product_id);
        let mut sales = Vec::new();
        let mut offset = 0;

        while (sales.len() as u32) < limit {
            let page_size = SALES_PAGE_SIZE.min(limit - sales.len() as u32);
            let request = LatestSalesRequest::new(filter, offset, page_size);
            debug!(
                "Fetching sales for product {} (offset {}, limit {})",
                product_id, offset, page_size
            );

            let page: LatestSalesResponse = self.post_json(&url, &request, "latest sales").await?;
            let received = page.data.len() as u32;
            offset += received;
            let more = page.has_more(offset);
            sales.extend(page.data.into_iter().filter_map(RawSale::into_observation));

            if received < page_size || !more {
                break;
            }
        }

        sales.truncate(limit as usize);
        Ok(sales)
    }

    async fn fetch_listings(
        &self,
        product_id: u64,
        filter: &SalesFilter,
        query: &ListingQuery,
    ) -> Result<Vec<ListingObservation>> {
        let url = format!("{}/product/{}/listings", self.base_url, product_id);
        let mut listings = Vec::new();

        for page in 0..query.max_pages {
            let request = ListingsRequest::new(filter, page * query.page_size, query.page_size);
            let response: ListingsResponse = self.post_json(&url, &request, "listings").await?;
            let received = response.results.len() as u32;
            let total = response.total_results;
            listings.extend(response.results.into_iter().map(RawListing::into_observation));

            if received < query.page_size || (total > 0 && listings.len() as u64 >= total) {
                break;
            }
        }

        debug!("Fetched {} listings for product {}", listings.len(), product_id);
        Ok(listings)
    }

    async fn fetch_market_price(&self, sku_id: u64) -> Result<Option<MarketPriceReference>> {
        let url = format!("{}/pricing/marketprices/{}", self.base_url, sku_id);
        let prices: Option<Vec<RawMarketPrice>> = self.get_json(&url, "market price").await?;

        Ok(prices
            .and_then(|p| p.into_iter().next())
            .map(RawMarketPrice::into_reference))
    }

    async fn fetch_filter_vocabulary(&self, category_id: u32) -> Result<FilterVocabulary> {
        let url = format!("{}/catalog/categories/{}/filters", self.base_url, category_id);
        let manifest: RawFilterManifest = self
            .get_json(&url, "filter vocabulary")
            .await?
            .ok_or_else(|| anyhow!("Category not found: {}", category_id))?;

        Ok(manifest.into_vocabulary())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LatestSalesRequest {
    conditions: Vec<u32>,
    languages: Vec<u32>,
    variants: Vec<u32>,
    listing_type: &'static str,
    offset: u32,
    limit: u32,
}

impl LatestSalesRequest {
    fn new(filter: &SalesFilter, offset: u32, limit: u32) -> Self {
        Self {
            conditions: filter.condition.into_iter().collect(),
            languages: filter.language.into_iter().collect(),
            variants: filter.variant.into_iter().collect(),
            listing_type: "All",
            offset,
            limit,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestSalesResponse {
    #[serde(default)]
    total_results: Option<u64>,
    #[serde(default)]
    data: Vec<RawSale>,
}

impl LatestSalesResponse {
    fn has_more(&self, fetched: u32) -> bool {
        self.total_results.map_or(true, |total| (fetched as u64) < total)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSale {
    condition: String,
    purchase_price: f64,
    #[serde(default = "default_quantity")]
    quantity: u32,
    order_date: DateTime<Utc>,
}

fn default_quantity() -> u32 {
    1
}

impl RawSale {
    fn into_observation(self) -> Option<SaleObservation> {
        match Condition::from_name(&self.condition) {
            Some(condition) => Some(SaleObservation::new(
                condition,
                self.purchase_price,
                self.quantity,
                self.order_date,
            )),
            None => {
                debug!("Dropping sale with unknown condition '{}'", self.condition);
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingsRequest {
    conditions: Vec<u32>,
    languages: Vec<u32>,
    variants: Vec<u32>,
    from: u32,
    size: u32,
    sort: &'static str,
}

impl ListingsRequest {
    fn new(filter: &SalesFilter, from: u32, size: u32) -> Self {
        Self {
            conditions: filter.condition.into_iter().collect(),
            languages: filter.language.into_iter().collect(),
            variants: filter.variant.into_iter().collect(),
            from,
            size,
            sort: "price+shipping:asc",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingsResponse {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    results: Vec<RawListing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    price: f64,
    #[serde(default)]
    shipping_price: f64,
    #[serde(default = "default_quantity")]
    quantity: u32,
    #[serde(default)]
    verified_seller: bool,
}

impl RawListing {
    fn into_observation(self) -> ListingObservation {
        ListingObservation {
            price: self.price,
            shipping_price: self.shipping_price,
            quantity: self.quantity,
            verified_seller: self.verified_seller,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarketPrice {
    market_price: Option<f64>,
    lowest_price: Option<f64>,
    highest_price: Option<f64>,
    #[serde(default)]
    price_count: u32,
}

impl RawMarketPrice {
    fn into_reference(self) -> MarketPriceReference {
        MarketPriceReference {
            market_price: self.market_price,
            lowest_price: self.lowest_price,
            highest_price: self.highest_price,
            sample_count: self.price_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawFilterEntry {
    name: String,
    id: u32,
}

#[derive(Debug, Deserialize)]
struct RawFilterManifest {
    #[serde(default)]
    conditions: Vec<RawFilterEntry>,
    #[serde(default)]
    languages: Vec<RawFilterEntry>,
    #[serde(default, alias = "printings")]
    variants: Vec<RawFilterEntry>,
}

impl RawFilterManifest {
    fn into_vocabulary(self) -> FilterVocabulary {
        let pairs = |entries: Vec<RawFilterEntry>| {
            entries.into_iter().map(|e| (e.name, e.id)).collect::<Vec<_>>()
        };
        FilterVocabulary::from_pairs(
            pairs(self.conditions),
            pairs(self.languages),
            pairs(self.variants),
        )
    }
}
