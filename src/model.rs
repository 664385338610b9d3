// Core structs: Listing, ListingGroup, CombinedProduct
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A regular catalog entry as sold by one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub price: f64,
    pub store: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// An active promotion. `new_price` is what the shopper pays right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub new_price: f64,
    pub previous_price: f64,
    pub store: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

impl PromotionItem {
    /// Open bounds count as satisfied.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let started = self.valid_from.is_none_or(|from| from <= at);
        let not_ended = self.valid_until.is_none_or(|until| at <= until);
        started && not_ended
    }
}

/// One store's price entry for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Listing {
    Regular(CatalogItem),
    Promotion(PromotionItem),
}

impl Listing {
    pub fn id(&self) -> &str {
        match self {
            Listing::Regular(item) => &item.id,
            Listing::Promotion(promo) => &promo.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Listing::Regular(item) => &item.name,
            Listing::Promotion(promo) => &promo.name,
        }
    }

    pub fn brand(&self) -> Option<&str> {
        match self {
            Listing::Regular(item) => item.brand.as_deref(),
            Listing::Promotion(promo) => promo.brand.as_deref(),
        }
    }

    pub fn size(&self) -> Option<&str> {
        match self {
            Listing::Regular(item) => item.size.as_deref(),
            Listing::Promotion(promo) => promo.size.as_deref(),
        }
    }

    /// Current shelf price; for promotions this is the promotional price.
    pub fn price(&self) -> f64 {
        match self {
            Listing::Regular(item) => item.price,
            Listing::Promotion(promo) => promo.new_price,
        }
    }

    pub fn store(&self) -> &str {
        match self {
            Listing::Regular(item) => &item.store,
            Listing::Promotion(promo) => &promo.store,
        }
    }

    pub fn categories(&self) -> &[String] {
        match self {
            Listing::Regular(item) => &item.categories,
            Listing::Promotion(promo) => &promo.categories,
        }
    }

    pub fn is_promotion(&self) -> bool {
        matches!(self, Listing::Promotion(_))
    }

    pub fn as_promotion(&self) -> Option<&PromotionItem> {
        match self {
            Listing::Promotion(promo) => Some(promo),
            Listing::Regular(_) => None,
        }
    }

    /// True when both listings carry at least one common category tag.
    pub fn shares_category_with(&self, other: &Listing) -> bool {
        self.categories().iter().any(|c| {
            other
                .categories()
                .iter()
                .any(|o| o.trim().eq_ignore_ascii_case(c.trim()))
        })
    }
}

/// A listing together with the price it competes with inside its group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedListing {
    pub listing: Listing,
    pub effective_price: f64,
    pub is_promotion: bool,
}

/// Positions into a group's descending-price listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceComparison {
    pub highest_index: usize,
    pub middle_index: Option<usize>,
    pub lowest_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingGroup {
    pub listings: Vec<PricedListing>,
    pub price_comparison: Option<PriceComparison>,
}

impl ListingGroup {
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn lowest(&self) -> Option<&PricedListing> {
        self.price_comparison
            .and_then(|cmp| self.listings.get(cmp.lowest_index))
    }
}

/// Display-ready record summarizing one matched group across stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedProduct {
    pub name: String,
    pub brand: Option<String>,
    pub size: Option<String>,
    pub categories: Vec<String>,
    /// Ascending by effective price.
    pub listings: Vec<PricedListing>,
    pub primary_listing_id: String,
}

impl CombinedProduct {
    pub fn best_price(&self) -> Option<f64> {
        self.listings.first().map(|l| l.effective_price)
    }

    /// Difference between the most and least expensive store.
    pub fn price_spread(&self) -> f64 {
        match (self.listings.first(), self.listings.last()) {
            (Some(low), Some(high)) => high.effective_price - low.effective_price,
            _ => 0.0,
        }
    }

    pub fn store_count(&self) -> usize {
        self.listings.len()
    }
}

/// Which stores a source should return listings for. Empty means all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreFilter {
    pub stores: Vec<String>,
}

impl StoreFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, store: &str) -> bool {
        self.stores.is_empty()
            || self
                .stores
                .iter()
                .any(|s| s.trim().eq_ignore_ascii_case(store.trim()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("request timed out")]
    Timeout,
    #[error("invalid listing payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid datetime: {0}")]
    InvalidDatetime(#[from] chrono::ParseError),
    #[error("invalid listing kind: {0}")]
    InvalidKind(String),
}

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("cannot encode products: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
