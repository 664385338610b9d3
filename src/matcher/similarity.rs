use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use strsim::{levenshtein, normalized_levenshtein};

static SIZE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:[.,]\d+)?\s*(?:gm|kg|ml|pcs|g|l|x\d+)\b").unwrap()
});
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const EXACT_WORD: f64 = 1.0;
const SIMILAR_WORD: f64 = 0.8;
const SUBSTRING_WORD: f64 = 0.6;
const LEVENSHTEIN_WEIGHT: f64 = 0.7;

/// How strict tokenization is. Listings that share a category tag already
/// agree on context, so short filler words are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchContext {
    CrossCategory,
    SharedCategory,
}

impl MatchContext {
    fn min_word_len(self) -> usize {
        match self {
            MatchContext::CrossCategory => 2,
            MatchContext::SharedCategory => 3,
        }
    }
}

/// Scores two product names in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NameSimilarity {
    similar_word_threshold: f64,
}

impl Default for NameSimilarity {
    fn default() -> Self {
        Self::new(0.75)
    }
}

impl NameSimilarity {
    pub fn new(similar_word_threshold: f64) -> Self {
        Self { similar_word_threshold }
    }

    pub fn score(&self, a: &str, b: &str, context: MatchContext) -> f64 {
        let clean_a = clean_name(a);
        let clean_b = clean_name(b);

        if clean_a == clean_b {
            return 1.0;
        }

        let words_a = tokenize(&clean_a, context);
        let words_b = tokenize(&clean_b, context);

        let jaccard = jaccard(&words_a, &words_b);
        let overlap = self.word_overlap(&words_a, &words_b);
        let lev = levenshtein_similarity(&clean_a, &clean_b);

        jaccard.max(overlap).max(lev * LEVENSHTEIN_WEIGHT)
    }

    // Similar words contain one another or differ by plurals, typos and OCR artifacts.
    fn word_score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            EXACT_WORD
        } else if a.contains(b)
            || b.contains(a)
            || normalized_levenshtein(a, b) >= self.similar_word_threshold
        {
            SIMILAR_WORD
        } else if a.contains(b) || b.contains(a) {
            SUBSTRING_WORD
        } else {
            0.0
        }
    }

    // Each word of the shorter list contributes its best award once.
    fn word_overlap(&self, words_a: &[String], words_b: &[String]) -> f64 {
        let (short, long) = if words_a.len() <= words_b.len() {
            (words_a, words_b)
        } else {
            (words_b, words_a)
        };
        if short.is_empty() {
            return 0.0;
        }

        let total: f64 = short
            .iter()
            .map(|w| {
                long.iter()
                    .map(|o| self.word_score(w, o))
                    .fold(0.0, f64::max)
            })
            .sum();

        (total / short.len() as f64).min(1.0)
    }
}

/// Lower-cases, drops embedded size tokens and collapses whitespace.
pub fn clean_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let without_sizes = SIZE_TOKEN.replace_all(&lower, " ");
    WHITESPACE.replace_all(&without_sizes, " ").trim().to_string()
}

fn tokenize(clean: &str, context: MatchContext) -> Vec<String> {
    let min_len = context.min_word_len();
    let mut seen = HashSet::new();
    clean
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= min_len)
        .filter(|w| seen.insert(*w))
        .map(str::to_string)
        .collect()
}

fn jaccard(words_a: &[String], words_b: &[String]) -> f64 {
    let set_a: HashSet<&str> = words_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = words_b.iter().map(String::as_str).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(a: &str, b: &str) -> f64 {
        NameSimilarity::default().score(a, b, MatchContext::CrossCategory)
    }

    #[test]
    fn clean_name_strips_sizes_and_spacing() {
        assert_eq!(clean_name("COCA-COLA 2L"), "coca-cola");
        assert_eq!(clean_name("  Basmati   Rice 1kg  "), "basmati rice");
        assert_eq!(clean_name("Eggs 2x12 tray"), "eggs tray");
        assert_eq!(clean_name("Milk 1,5l"), "milk");
    }

    #[test]
    fn identical_after_cleaning_scores_one() {
        assert_eq!(score("Coca Cola 2L", "coca   cola"), 1.0);
    }

    #[test]
    fn extra_words_still_match() {
        let s = score("COCA COLA", "Coca Cola Original 2L");
        assert!(s >= 0.99, "got {s}");
    }

    #[test]
    fn hyphenated_names_match_spaced_names() {
        let s = score("COCA COLA", "COCA-COLA 2L");
        assert!(s >= 0.5, "got {s}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let s = score("Basmati Rice", "Dish Washing Liquid");
        assert!(s < 0.5, "got {s}");
    }

    #[test]
    fn word_awards() {
        let sim = NameSimilarity::default();
        assert_eq!(sim.word_score("rice", "rice"), EXACT_WORD);
        assert_eq!(sim.word_score("tomatoes", "tomato"), SIMILAR_WORD);
        assert_eq!(sim.word_score("chocolate", "chocolote"), SIMILAR_WORD);
        assert_eq!(sim.word_score("cola", "cocacola"), SIMILAR_WORD);
        assert_eq!(sim.word_score("choco", "chocolate"), SIMILAR_WORD);
        assert_eq!(sim.word_score("rice", "milk"), 0.0);
    }

    #[test]
    fn typo_threshold_is_configurable() {
        let strict = NameSimilarity::new(0.95);
        assert_eq!(strict.word_score("chocolate", "chocolote"), 0.0);
    }

    #[test]
    fn contained_words_lift_overlap_over_threshold() {
        // choco ~ chocolate and milk ~ milkshake each award 0.8, drink nothing
        let s = score("choco milk drink", "chocolate milkshake bottle");
        assert!((s - 1.6 / 3.0).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn weighted_levenshtein_wins_when_words_disagree() {
        // no shared or similar words, so only the edit distance term scores
        let s = score("Tang", "Tide");
        assert!((s - 0.25 * LEVENSHTEIN_WEIGHT).abs() < 1e-9, "got {s}");

        // single-letter words are not tokens at all
        let s = score("a b c", "a b d");
        assert!((s - 0.8 * LEVENSHTEIN_WEIGHT).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn score_stays_within_unit_interval() {
        let s = score("choco choco chip", "chocolate chip cookies");
        assert!((0.0..=1.0).contains(&s), "got {s}");
    }

    #[test]
    fn shared_category_drops_short_words() {
        let sim = NameSimilarity::default();
        let shared = sim.score("bag of rice", "rice", MatchContext::SharedCategory);
        assert_eq!(shared, 1.0);
    }

    #[test]
    fn shared_category_ignores_two_letter_codes() {
        let sim = NameSimilarity::default();
        let (a, b) = ("Oat Drink GF DF VG", "Oat Drink NL BE LU");
        assert!(sim.score(a, b, MatchContext::CrossCategory) < 0.5);
        assert_eq!(sim.score(a, b, MatchContext::SharedCategory), 1.0);
    }
}
