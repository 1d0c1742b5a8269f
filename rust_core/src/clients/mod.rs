pub mod cached;
pub mod http;
pub mod marketplace;

// Re-export commonly used types
pub use cached::{CacheStats, CachedMarketplace, LookupCache};
pub use http::MarketplaceHttpClient;
pub use marketplace::MarketplaceClient;
