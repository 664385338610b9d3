use crate::model::{CombinedProduct, ListingGroup, PricedListing};

/// Rank given to stores that match no configured pattern.
pub const UNRANKED: usize = 99;

/// Ordered store-name patterns. Earlier patterns win the primary listing.
#[derive(Debug, Clone, Default)]
pub struct StorePriority {
    patterns: Vec<String>,
}

impl StorePriority {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Index of the first pattern contained in `store`, case-insensitively.
    pub fn rank(&self, store: &str) -> usize {
        let store = store.to_lowercase();
        self.patterns
            .iter()
            .position(|p| store.contains(p.as_str()))
            .unwrap_or(UNRANKED)
    }
}

pub fn build_combined_product(group: &ListingGroup, priority: &StorePriority) -> Option<CombinedProduct> {
    // min_by_key keeps the first of equal ranks
    let primary = group
        .listings
        .iter()
        .min_by_key(|l| priority.rank(l.listing.store()))?;

    let mut listings: Vec<PricedListing> = group.listings.clone();
    listings.sort_by(|a, b| a.effective_price.total_cmp(&b.effective_price));

    let lead = &primary.listing;
    Some(CombinedProduct {
        name: lead.name().to_string(),
        brand: lead.brand().map(str::to_string),
        size: lead.size().map(str::to_string),
        categories: lead.categories().to_vec(),
        listings,
        primary_listing_id: lead.id().to_string(),
    })
}

pub fn build_combined_products(groups: &[ListingGroup], priority: &StorePriority) -> Vec<CombinedProduct> {
    groups
        .iter()
        .filter_map(|g| build_combined_product(g, priority))
        .collect()
}
