//! Category filter vocabulary
//!
//! Translates a SKU's human-readable attributes (condition, language,
//! variant) into the marketplace's numeric filter ids.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use super::{Condition, SalesFilter, Sku};

/// Name -> external filter id tables for one category.
///
/// Keys are stored lowercased so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterVocabulary {
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub conditions: HashMap<String, u32>,
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub languages: HashMap<String, u32>,
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub variants: HashMap<String, u32>,
}

fn normalize_keys(pairs: impl IntoIterator<Item = (String, u32)>) -> HashMap<String, u32> {
    pairs
        .into_iter()
        .map(|(name, id)| (name.trim().to_lowercase(), id))
        .collect()
}

fn lowercase_keys<'de, D>(deserializer: D) -> Result<HashMap<String, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    HashMap::<String, u32>::deserialize(deserializer).map(normalize_keys)
}

/// Outcome of translating a SKU into filter ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter {
    pub condition: Condition,
    pub filter: SalesFilter,
    /// Language/variant names the vocabulary did not know (filter omitted)
    pub unmatched: Vec<String>,
}

impl FilterVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (name, id) pairs as returned by the marketplace.
    pub fn from_pairs<C, L, V>(conditions: C, languages: L, variants: V) -> Self
    where
        C: IntoIterator<Item = (String, u32)>,
        L: IntoIterator<Item = (String, u32)>,
        V: IntoIterator<Item = (String, u32)>,
    {
        Self {
            conditions: normalize_keys(conditions),
            languages: normalize_keys(languages),
            variants: normalize_keys(variants),
        }
    }

    pub fn condition_id(&self, condition: Condition) -> Option<u32> {
        let wanted = condition.as_str().to_lowercase();
        self.conditions.get(&wanted).copied().or_else(|| {
            // Vocabularies sometimes carry abbreviations or suffixed names
            self.conditions
                .iter()
                .find(|(name, _)| Condition::from_name(name) == Some(condition))
                .map(|(_, id)| *id)
        })
    }

    pub fn language_id(&self, name: &str) -> Option<u32> {
        self.languages.get(&name.trim().to_lowercase()).copied()
    }

    pub fn variant_id(&self, name: &str) -> Option<u32> {
        self.variants.get(&name.trim().to_lowercase()).copied()
    }

    /// Translate a SKU's attributes into a sales filter.
    ///
    /// Returns `None` when the SKU's condition cannot be parsed or is absent
    /// from the vocabulary. Unknown languages/variants are left unfiltered
    /// and reported in `unmatched`.
    pub fn resolve(&self, sku: &Sku) -> Option<ResolvedFilter> {
        let condition = Condition::from_name(&sku.condition)?;
        let condition_id = self.condition_id(condition)?;

        let mut unmatched = Vec::new();

        let language = match sku.language.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(name) => {
                let id = self.language_id(name);
                if id.is_none() {
                    unmatched.push(format!("language '{}'", name));
                }
                id
            }
            None => None,
        };

        let variant = match sku.variant.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(name) => {
                let id = self.variant_id(name);
                if id.is_none() {
                    unmatched.push(format!("variant '{}'", name));
                }
                id
            }
            None => None,
        };

        Some(ResolvedFilter {
            condition,
            filter: SalesFilter {
                condition: Some(condition_id),
                language,
                variant,
            },
            unmatched,
        })
    }
}
