use crate::matcher::optimizer::store_key;
use crate::matcher::similarity::{MatchContext, NameSimilarity};
use crate::model::{Listing, ListingGroup, PriceComparison, PricedListing};
use crate::normalizer::{brand_bucket_key, size_bucket_key};
use chrono::{DateTime, Utc};

/// Finds the promotion, if any, currently running for a regular listing.
pub trait PromotionMatcher: Send + Sync {
    fn find_active_promotion<'a>(
        &self,
        listing: &Listing,
        promotions: &[&'a Listing],
    ) -> Option<&'a Listing>;
}

/// Matches a promotion to a catalog entry of the same store, size and brand
/// whose name is close enough. The first match in input order wins.
#[derive(Debug, Clone)]
pub struct CatalogPromotionMatcher {
    pub name_threshold: f64,
    pub as_of: DateTime<Utc>,
    scorer: NameSimilarity,
}

impl CatalogPromotionMatcher {
    pub fn new(name_threshold: f64, as_of: DateTime<Utc>, scorer: NameSimilarity) -> Self {
        Self { name_threshold, as_of, scorer }
    }
}

impl PromotionMatcher for CatalogPromotionMatcher {
    fn find_active_promotion<'a>(
        &self,
        listing: &Listing,
        promotions: &[&'a Listing],
    ) -> Option<&'a Listing> {
        let store = store_key(listing.store());
        let size = size_bucket_key(listing.size());
        let brand = brand_bucket_key(listing.brand());

        promotions.iter().copied().find(|candidate| {
            let Some(promo) = candidate.as_promotion() else {
                return false;
            };
            promo.is_active_at(self.as_of)
                && store_key(&promo.store) == store
                && size_bucket_key(promo.size.as_deref()) == size
                && brand_bucket_key(promo.brand.as_deref()) == brand
                && self.scorer.score(listing.name(), &promo.name, MatchContext::CrossCategory)
                    >= self.name_threshold
        })
    }
}

/// Resolves effective prices against the promotions of one batch.
pub struct PriceResolver<'a> {
    matcher: &'a dyn PromotionMatcher,
    promotions: Vec<&'a Listing>,
}

impl<'a> PriceResolver<'a> {
    pub fn new(matcher: &'a dyn PromotionMatcher, listings: &'a [Listing]) -> Self {
        let promotions = listings.iter().filter(|l| l.is_promotion()).collect();
        Self { matcher, promotions }
    }

    pub fn promotion_count(&self) -> usize {
        self.promotions.len()
    }

    pub fn resolve(&self, listing: &Listing) -> PricedListing {
        let (effective_price, is_promotion) = match listing {
            Listing::Promotion(promo) => (promo.new_price, true),
            Listing::Regular(item) => match self.matcher.find_active_promotion(listing, &self.promotions) {
                Some(promo) => (promo.price(), true),
                None => (item.price, false),
            },
        };

        PricedListing {
            listing: listing.clone(),
            effective_price,
            is_promotion,
        }
    }
}

/// Sorts a group highest price first and records the rank positions.
pub fn rank_group(mut listings: Vec<PricedListing>) -> ListingGroup {
    listings.sort_by(|a, b| b.effective_price.total_cmp(&a.effective_price));
    let price_comparison = comparison_for_len(listings.len());
    ListingGroup { listings, price_comparison }
}

fn comparison_for_len(len: usize) -> Option<PriceComparison> {
    match len {
        0 => None,
        1 => Some(PriceComparison { highest_index: 0, middle_index: None, lowest_index: 0 }),
        2 => Some(PriceComparison { highest_index: 0, middle_index: None, lowest_index: 1 }),
        n => Some(PriceComparison { highest_index: 0, middle_index: Some(1), lowest_index: n - 1 }),
    }
}
