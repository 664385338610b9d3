use crate::matcher::similarity::{MatchContext, NameSimilarity};
use crate::model::Listing;
use std::collections::HashSet;
use tracing::debug;

/// Largest group a product card can show.
pub const MAX_GROUP_SIZE: usize = 3;

/// Assembles listings of one (size, brand) bucket into multi-store groups.
///
/// Returned groups hold positions into `bucket`. Listings left out of every
/// group are emitted as singletons by the caller.
pub trait GroupingStrategy: Send + Sync {
    fn assemble(&self, bucket: &[&Listing], scorer: &NameSimilarity) -> Vec<Vec<usize>>;
}

/// Greedy seed-and-extend matching. Each unmatched listing, in input order,
/// tries to take its two best candidates, then its best one.
///
/// Not globally optimal: an early seed can lock a listing into a pair that a
/// later seed would have completed into a triad.
#[derive(Debug, Clone)]
pub struct GreedyGrouping {
    pub name_threshold: f64,
}

impl Default for GreedyGrouping {
    fn default() -> Self {
        Self { name_threshold: 0.5 }
    }
}

impl GroupingStrategy for GreedyGrouping {
    fn assemble(&self, bucket: &[&Listing], scorer: &NameSimilarity) -> Vec<Vec<usize>> {
        let mut used = vec![false; bucket.len()];
        let mut groups = Vec::new();

        for i in 0..bucket.len() {
            if used[i] {
                continue;
            }

            let candidates = self.candidates(i, bucket, &used, scorer);
            if candidates.is_empty() {
                continue;
            }

            let accepted = [
                candidates.get(1).map(|&c1| vec![i, candidates[0], c1]),
                Some(vec![i, candidates[0]]),
            ]
            .into_iter()
            .flatten()
            .find(|group| stores_are_distinct(bucket, group));

            if let Some(group) = accepted {
                debug!(
                    "Grouped {} listings seeded by {}",
                    group.len(),
                    bucket[i].id()
                );
                for &idx in &group {
                    used[idx] = true;
                }
                groups.push(group);
            }
        }

        groups
    }
}

impl GreedyGrouping {
    /// Unmatched listings scoring at least the threshold, best first.
    /// The stable sort keeps input order among equal scores.
    fn candidates(
        &self,
        seed: usize,
        bucket: &[&Listing],
        used: &[bool],
        scorer: &NameSimilarity,
    ) -> Vec<usize> {
        let mut scored: Vec<(usize, f64)> = bucket
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != seed && !used[*j])
            .map(|(j, other)| {
                let context = if bucket[seed].shares_category_with(other) {
                    MatchContext::SharedCategory
                } else {
                    MatchContext::CrossCategory
                };
                (j, scorer.score(bucket[seed].name(), other.name(), context))
            })
            .filter(|(_, score)| *score >= self.name_threshold)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().map(|(j, _)| j).collect()
    }
}

/// Normalized store identity used by the diversity check.
pub fn store_key(store: &str) -> String {
    store.trim().to_lowercase()
}

fn stores_are_distinct(bucket: &[&Listing], group: &[usize]) -> bool {
    let mut seen = HashSet::new();
    group.len() <= MAX_GROUP_SIZE && group.iter().all(|&idx| seen.insert(store_key(bucket[idx].store())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CatalogItem;

    fn listing(id: &str, name: &str, store: &str) -> Listing {
        Listing::Regular(CatalogItem {
            id: id.into(),
            name: name.into(),
            brand: None,
            size: None,
            price: 10.0,
            store: store.into(),
            categories: Vec::new(),
        })
    }

    fn assemble(listings: &[Listing]) -> Vec<Vec<usize>> {
        let refs: Vec<&Listing> = listings.iter().collect();
        GreedyGrouping::default().assemble(&refs, &NameSimilarity::default())
    }

    #[test]
    fn three_stores_form_a_triad() {
        let listings = [
            listing("a", "Basmati Rice", "A"),
            listing("b", "Basmati Rice", "B"),
            listing("c", "Basmati Rice Premium", "C"),
        ];
        assert_eq!(assemble(&listings), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn same_store_pair_is_rejected() {
        let listings = [
            listing("a", "Basmati Rice", "A"),
            listing("b", "Basmati Rice", "a "),
        ];
        assert!(assemble(&listings).is_empty());
    }

    #[test]
    fn falls_back_to_pair_when_triad_repeats_a_store() {
        let listings = [
            listing("a", "Basmati Rice", "A"),
            listing("b", "Basmati Rice", "B"),
            listing("c", "Basmati Rice", "B"),
        ];
        assert_eq!(assemble(&listings), vec![vec![0, 1]]);
    }

    #[test]
    fn later_seed_can_claim_a_skipped_listing() {
        // a's best candidate shares its store, so a stays unmatched until c seeds
        let listings = [
            listing("a", "Basmati Rice", "A"),
            listing("b", "Basmati Rice", "A"),
            listing("c", "Basmati Rice", "C"),
        ];
        let groups = assemble(&listings);
        assert_eq!(groups, vec![vec![2, 0]]);
    }

    #[test]
    fn dissimilar_names_stay_apart() {
        let listings = [
            listing("a", "Basmati Rice", "A"),
            listing("b", "Dish Washing Liquid", "B"),
        ];
        assert!(assemble(&listings).is_empty());
    }

    #[test]
    fn candidates_prefer_higher_scores() {
        let listings = [
            listing("a", "Greek Yogurt Honey", "A"),
            listing("b", "Greek Yogurt Strawberry Pieces", "B"),
            listing("c", "Greek Yogurt Honey", "C"),
        ];
        let refs: Vec<&Listing> = listings.iter().collect();
        let greedy = GreedyGrouping::default();
        let used = vec![false; 3];
        let order = greedy.candidates(0, &refs, &used, &NameSimilarity::default());
        assert_eq!(order.first(), Some(&2));
    }
}
