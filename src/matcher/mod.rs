// Matcher module: buckets listings, groups them across stores and builds product cards.

pub mod combined;
pub mod optimizer;
pub mod pricing;
pub mod similarity;

pub use combined::StorePriority;
pub use optimizer::{GreedyGrouping, GroupingStrategy};
pub use pricing::{CatalogPromotionMatcher, PriceResolver, PromotionMatcher};
pub use similarity::{MatchContext, NameSimilarity};

use crate::config::MatchingConfig;
use crate::model::{CombinedProduct, Listing, ListingGroup};
use crate::normalizer::{brand_bucket_key, size_bucket_key};
use chrono::{DateTime, Utc};
use optimizer::{MAX_GROUP_SIZE, store_key};
use pricing::rank_group;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Listings that agree on size and brand and may therefore be name-matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub size_key: String,
    pub brand_key: String,
    /// Positions into the input slice, in input order.
    pub members: Vec<usize>,
}

/// Splits listings into (size, brand) buckets ordered by first appearance.
pub fn bucket_listings(listings: &[Listing]) -> Vec<Bucket> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for (i, listing) in listings.iter().enumerate() {
        let key = (size_bucket_key(listing.size()), brand_bucket_key(listing.brand()));
        let pos = *index.entry(key.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                size_key: key.0,
                brand_key: key.1,
                members: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[pos].members.push(i);
    }

    buckets
}

/// Counts describing one matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub listings: usize,
    pub promotions: usize,
    pub triads: usize,
    pub pairs: usize,
    pub singletons: usize,
}

impl MatchSummary {
    pub fn from_groups(groups: &[ListingGroup], promotions: usize) -> Self {
        let mut summary = Self { promotions, ..Self::default() };
        for group in groups {
            summary.listings += group.len();
            match group.len() {
                3 => summary.triads += 1,
                2 => summary.pairs += 1,
                _ => summary.singletons += 1,
            }
        }
        summary
    }

    pub fn groups(&self) -> usize {
        self.triads + self.pairs + self.singletons
    }
}

/// Result of grouping a batch and building its product cards.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub groups: Vec<ListingGroup>,
    pub products: Vec<CombinedProduct>,
    pub summary: MatchSummary,
}

/// The listing matching and grouping engine. Holds configuration only; every
/// call works on a fresh snapshot.
pub struct MatchingEngine {
    scorer: NameSimilarity,
    strategy: Box<dyn GroupingStrategy>,
    promotions: Box<dyn PromotionMatcher>,
    priority: StorePriority,
}

impl MatchingEngine {
    /// Builds the default engine. `as_of` decides which promotions are active.
    pub fn new(config: &MatchingConfig, as_of: DateTime<Utc>) -> Self {
        let scorer = NameSimilarity::new(config.similar_word_threshold);
        Self {
            strategy: Box::new(GreedyGrouping { name_threshold: config.name_threshold }),
            promotions: Box::new(CatalogPromotionMatcher::new(
                config.promotion_name_threshold,
                as_of,
                scorer.clone(),
            )),
            priority: StorePriority::new(config.store_priority.iter().cloned()),
            scorer,
        }
    }

    pub fn with_strategy(mut self, strategy: impl GroupingStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn with_promotion_matcher(mut self, matcher: impl PromotionMatcher + 'static) -> Self {
        self.promotions = Box::new(matcher);
        self
    }

    pub fn with_store_priority(mut self, priority: StorePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Partitions `listings` into price-ranked groups of one to three.
    ///
    /// Matched groups come first, in bucket order; every listing no strategy
    /// claimed follows as a singleton, in input order.
    pub fn group_listings(&self, listings: &[Listing]) -> Vec<ListingGroup> {
        let resolver = PriceResolver::new(self.promotions.as_ref(), listings);
        let buckets = bucket_listings(listings);
        debug!(
            "Bucketed {} listings ({} promotions) into {} buckets",
            listings.len(),
            resolver.promotion_count(),
            buckets.len()
        );

        let mut assigned = vec![false; listings.len()];
        let mut groups = Vec::new();

        for bucket in buckets.iter().filter(|b| b.members.len() > 1) {
            let refs: Vec<&Listing> = bucket.members.iter().map(|&i| &listings[i]).collect();

            for local in self.strategy.assemble(&refs, &self.scorer) {
                let members: Vec<usize> = local
                    .iter()
                    .filter_map(|&j| bucket.members.get(j).copied())
                    .collect();

                if !is_valid_group(&members, &assigned, listings) {
                    warn!(
                        "Discarding invalid group from strategy in bucket {}/{}",
                        bucket.size_key, bucket.brand_key
                    );
                    continue;
                }

                for &i in &members {
                    assigned[i] = true;
                }
                groups.push(rank_group(
                    members.iter().map(|&i| resolver.resolve(&listings[i])).collect(),
                ));
            }
        }

        for (i, listing) in listings.iter().enumerate() {
            if !assigned[i] {
                groups.push(rank_group(vec![resolver.resolve(listing)]));
            }
        }

        groups
    }

    pub fn build_combined_products(&self, groups: &[ListingGroup]) -> Vec<CombinedProduct> {
        combined::build_combined_products(groups, &self.priority)
    }

    /// Groups, ranks and builds product cards in one pass.
    pub fn match_listings(&self, listings: &[Listing]) -> MatchOutcome {
        let groups = self.group_listings(listings);
        let products = self.build_combined_products(&groups);
        let promotions = listings.iter().filter(|l| l.is_promotion()).count();
        let summary = MatchSummary::from_groups(&groups, promotions);

        info!(
            "Matched {} listings into {} products ({} triads, {} pairs, {} singletons)",
            summary.listings,
            summary.groups(),
            summary.triads,
            summary.pairs,
            summary.singletons
        );

        MatchOutcome { groups, products, summary }
    }
}

// Guards the partition and store-diversity invariants against any strategy.
fn is_valid_group(members: &[usize], assigned: &[bool], listings: &[Listing]) -> bool {
    let mut stores = HashSet::new();
    let mut seen = HashSet::new();
    (2..=MAX_GROUP_SIZE).contains(&members.len())
        && members.iter().all(|&i| {
            !assigned[i] && seen.insert(i) && stores.insert(store_key(listings[i].store()))
        })
}
