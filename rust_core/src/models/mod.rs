// Shared models for the card pricer core
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod vocabulary;

pub use vocabulary::FilterVocabulary;

// ============================================================================
// Condition Grades
// ============================================================================

/// Card condition grade, ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    NearMint,
    LightlyPlayed,
    ModeratelyPlayed,
    HeavilyPlayed,
    Damaged,
}

impl Condition {
    /// All grades in rank order.
    pub const ALL: [Condition; 5] = [
        Condition::NearMint,
        Condition::LightlyPlayed,
        Condition::ModeratelyPlayed,
        Condition::HeavilyPlayed,
        Condition::Damaged,
    ];

    /// Rank used by the Zipf model (Near Mint = 1).
    pub fn rank(&self) -> u8 {
        match self {
            Condition::NearMint => 1,
            Condition::LightlyPlayed => 2,
            Condition::ModeratelyPlayed => 3,
            Condition::HeavilyPlayed => 4,
            Condition::Damaged => 5,
        }
    }

    pub fn index(&self) -> usize {
        self.rank() as usize - 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::NearMint => "Near Mint",
            Condition::LightlyPlayed => "Lightly Played",
            Condition::ModeratelyPlayed => "Moderately Played",
            Condition::HeavilyPlayed => "Heavily Played",
            Condition::Damaged => "Damaged",
        }
    }

    /// Parse a human-readable grade name.
    ///
    /// Accepts display names ("Near Mint"), snake case ("near_mint") and the
    /// usual abbreviations ("NM", "LP", "MP", "HP", "DMG"). Printing suffixes
    /// such as "Near Mint Foil" are tolerated.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();

        match normalized.as_str() {
            "nm" => return Some(Condition::NearMint),
            "lp" => return Some(Condition::LightlyPlayed),
            "mp" => return Some(Condition::ModeratelyPlayed),
            "hp" => return Some(Condition::HeavilyPlayed),
            "dmg" | "d" => return Some(Condition::Damaged),
            _ => {}
        }

        Condition::ALL
            .into_iter()
            .find(|c| normalized.starts_with(&c.as_str().to_lowercase()))
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Marketplace Observations
// ============================================================================

/// A completed sale reported by the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleObservation {
    pub condition: Condition,
    pub price: f64,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}

impl SaleObservation {
    pub fn new(condition: Condition, price: f64, quantity: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            condition,
            price,
            quantity,
            timestamp,
        }
    }

    /// Zero-priced or zero-quantity sales carry no price signal.
    pub fn is_usable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.quantity > 0
    }
}

/// A listing currently competing for buyers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingObservation {
    pub price: f64,
    #[serde(default)]
    pub shipping_price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub verified_seller: bool,
}

impl ListingObservation {
    /// What a buyer pays for this listing.
    pub fn total_cost(&self) -> f64 {
        self.price + self.shipping_price
    }
}

/// Market price reference for one SKU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceReference {
    pub market_price: Option<f64>,
    pub lowest_price: Option<f64>,
    pub highest_price: Option<f64>,
    #[serde(default)]
    pub sample_count: u32,
}

impl MarketPriceReference {
    /// Market price when present and positive.
    pub fn usable_market_price(&self) -> Option<f64> {
        self.market_price.filter(|p| p.is_finite() && *p > 0.0)
    }
}

// ============================================================================
// Fetch Filters
// ============================================================================

/// External filter ids narrowing a sales or listings query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesFilter {
    pub condition: Option<u32>,
    pub language: Option<u32>,
    pub variant: Option<u32>,
}

impl SalesFilter {
    /// Same filter with the condition constraint removed.
    pub fn any_condition(&self) -> Self {
        Self {
            condition: None,
            ..self.clone()
        }
    }
}

/// Pagination for listing fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 4,
        }
    }
}

// ============================================================================
// Inventory SKU
// ============================================================================

/// One inventory line to be priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub sku_id: u64,
    pub product_id: u64,
    pub category_id: u32,
    pub condition: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub add_to_quantity: i64,
}

impl Sku {
    /// Owned plus pending-add quantity.
    pub fn total_quantity(&self) -> i64 {
        self.quantity + self.add_to_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_ranks_are_ordered() {
        let ranks: Vec<u8> = Condition::ALL.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert!(Condition::NearMint < Condition::Damaged);
    }

    #[test]
    fn test_condition_from_name() {
        assert_eq!(Condition::from_name("Near Mint"), Some(Condition::NearMint));
        assert_eq!(Condition::from_name("near_mint"), Some(Condition::NearMint));
        assert_eq!(Condition::from_name("LP"), Some(Condition::LightlyPlayed));
        assert_eq!(
            Condition::from_name("Heavily Played Foil"),
            Some(Condition::HeavilyPlayed)
        );
        assert_eq!(Condition::from_name("dmg"), Some(Condition::Damaged));
        assert_eq!(Condition::from_name("Mint-ish"), None);
    }

    #[test]
    fn test_sale_usability() {
        let now = Utc::now();
        assert!(SaleObservation::new(Condition::NearMint, 1.0, 1, now).is_usable());
        assert!(!SaleObservation::new(Condition::NearMint, 0.0, 1, now).is_usable());
        assert!(!SaleObservation::new(Condition::NearMint, 1.0, 0, now).is_usable());
    }

    #[test]
    fn test_sku_total_quantity() {
        let sku = Sku {
            sku_id: 1,
            product_id: 2,
            category_id: 1,
            condition: "Near Mint".to_string(),
            language: None,
            variant: None,
            quantity: 3,
            add_to_quantity: 2,
        };
        assert_eq!(sku.total_quantity(), 5);
    }

    #[test]
    fn test_market_price_reference_usable() {
        let reference = MarketPriceReference {
            market_price: Some(0.0),
            ..Default::default()
        };
        assert_eq!(reference.usable_market_price(), None);
    }
}
