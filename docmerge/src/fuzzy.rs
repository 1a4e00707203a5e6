//! Fuzzy matching of placeholder tokens to data fields
//!
//! Template authors rarely type column names exactly, so each token is
//! matched against the available fields with a token-sort similarity score.
//! The resulting [`Mapping`] is computed once per batch and shared by every
//! row.

use crate::normalize::normalize;
use std::collections::{BTreeMap, BTreeSet};

/// Default acceptance threshold for fuzzy matches
pub const DEFAULT_THRESHOLD: u8 = 85;

/// Score given to explicitly configured token → field overrides
pub const OVERRIDE_SCORE: u8 = 100;

/// Field chosen for one token, with its confidence score (0..=100)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Matched field name, or None when nothing scored above the threshold
    pub field: Option<String>,
    /// Similarity score; 0 when unmatched
    pub score: u8,
}

impl FieldMatch {
    /// A match with no field
    pub fn unmatched() -> Self {
        Self {
            field: None,
            score: 0,
        }
    }
}

/// Token → field mapping shared across all rows of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: BTreeMap<String, FieldMatch>,
}

impl Mapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the match for a token
    pub fn insert(&mut self, token: impl Into<String>, field_match: FieldMatch) {
        self.entries.insert(token.into(), field_match);
    }

    /// Look up the match for a token
    pub fn get(&self, token: &str) -> Option<&FieldMatch> {
        self.entries.get(token)
    }

    /// All tokens with their matches, sorted by token
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldMatch)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Only the tokens that resolved to a field
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(token, m)| m.field.as_deref().map(|field| (token.as_str(), field)))
    }

    /// All tokens in the mapping
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of tokens in the mapping
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no tokens
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort whitespace-delimited words alphabetically and rejoin them with single spaces
pub fn token_sort(s: &str) -> String {
    let mut words: Vec<&str> = s.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

/// Token-sort similarity between two strings, 0 (disjoint) to 100 (identical)
///
/// Both inputs are token-sorted, then compared with a normalized Levenshtein
/// similarity. An empty side always scores 0.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let a = token_sort(a);
    let b = token_sort(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let percent = strsim::normalized_levenshtein(&a, &b) * 100.0;
    // round half up, staying in 0..=100 without a float cast
    (0..=100u8)
        .rev()
        .find(|&p| f64::from(p) <= percent + 0.5)
        .unwrap_or(0)
}

/// Selects the best field for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatcher {
    threshold: u8,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FuzzyMatcher {
    /// Create a matcher accepting scores at or above `threshold`
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }

    /// The acceptance threshold
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Find the best-scoring candidate for `query`
    ///
    /// Ties go to the earliest candidate in slice order. Returns `(None, 0)`
    /// when the best score is below the threshold.
    pub fn best_match<'a, S: AsRef<str>>(
        &self,
        query: &str,
        candidates: &'a [S],
    ) -> (Option<&'a str>, u8) {
        match self.best_index(query, candidates) {
            (Some(idx), score) => (Some(candidates[idx].as_ref()), score),
            (None, score) => (None, score),
        }
    }

    fn best_index<S: AsRef<str>>(&self, query: &str, candidates: &[S]) -> (Option<usize>, u8) {
        let mut best: Option<(usize, u8)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let score = token_sort_ratio(query, candidate.as_ref());
            // strict comparison keeps the first candidate on ties
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        match best {
            Some((idx, score)) if score >= self.threshold => (Some(idx), score),
            _ => (None, 0),
        }
    }

    /// Build the token → field mapping for a batch
    ///
    /// # Parameters
    /// * `tokens` - Every placeholder token found in the template
    /// * `fields` - Column names in declared order
    /// * `overrides` - Explicit token → column assignments that bypass fuzzy matching
    ///
    /// # Returns
    /// * `Mapping` - One entry per token; unmatched tokens map to `(None, 0)`
    pub fn build_mapping(
        &self,
        tokens: &BTreeSet<String>,
        fields: &[String],
        overrides: &BTreeMap<String, String>,
    ) -> Mapping {
        let normalized_fields: Vec<String> = fields.iter().map(|f| normalize(f)).collect();
        let mut mapping = Mapping::new();

        for token in tokens {
            if let Some(column) = overrides.get(token) {
                if fields.iter().any(|f| f == column) {
                    log::debug!("Token '{}' mapped to '{}' by override", token, column);
                    mapping.insert(
                        token.clone(),
                        FieldMatch {
                            field: Some(column.clone()),
                            score: OVERRIDE_SCORE,
                        },
                    );
                    continue;
                }
                log::warn!(
                    "Override for '{}' names unknown column '{}', falling back to fuzzy matching",
                    token,
                    column
                );
            }

            let field_match = match self.best_index(&normalize(token), &normalized_fields) {
                (Some(idx), score) => FieldMatch {
                    field: Some(fields[idx].clone()),
                    score,
                },
                (None, _) => FieldMatch::unmatched(),
            };
            log::debug!(
                "Token '{}' -> {:?} (score {})",
                token,
                field_match.field,
                field_match.score
            );
            mapping.insert(token.clone(), field_match);
        }

        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn tokens(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_sort_orders_words() {
        assert_eq!(token_sort("name product"), "name product");
        assert_eq!(token_sort("  product   name "), "name product");
        assert_eq!(token_sort(""), "");
    }

    #[test]
    fn test_token_sort_ratio_ignores_word_order() {
        assert_eq!(token_sort_ratio("product name", "name product"), 100);
    }

    #[test]
    fn test_token_sort_ratio_bounds() {
        assert_eq!(token_sort_ratio("abc", "abc"), 100);
        assert_eq!(token_sort_ratio("abc", "xyz"), 0);
        assert_eq!(token_sort_ratio("", "abc"), 0);
        assert_eq!(token_sort_ratio("", ""), 0);
    }

    #[test]
    fn test_token_sort_ratio_rounds_to_nearest() {
        // one edit in two characters is exactly half
        assert_eq!(token_sort_ratio("ab", "ac"), 50);
        // 2/3 and 7/8 similar
        assert_eq!(token_sort_ratio("abc", "abd"), 67);
        assert_eq!(token_sort_ratio("abcdefgh", "abcdefgx"), 88);
    }

    #[test]
    fn test_best_match_accepts_close_candidate() {
        let matcher = FuzzyMatcher::default();
        let candidates = ["productname", "productcode"];
        let (best, score) = matcher.best_match("productnames", &candidates);
        assert_eq!(best, Some("productname"));
        assert!(score >= DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_best_match_rejects_below_threshold() {
        let matcher = FuzzyMatcher::default();
        let candidates = ["housing", "optics"];
        assert_eq!(matcher.best_match("productcode", &candidates), (None, 0));
    }

    #[test]
    fn test_best_match_tie_prefers_declared_order() {
        let matcher = FuzzyMatcher::new(50);
        // both candidates are one edit away from the query
        let candidates = ["w2", "w3"];
        assert_eq!(matcher.best_match("w1", &candidates).0, Some("w2"));
        let reversed = ["w3", "w2"];
        assert_eq!(matcher.best_match("w1", &reversed).0, Some("w3"));
    }

    #[test]
    fn test_best_match_empty_candidates() {
        let matcher = FuzzyMatcher::default();
        let candidates: [&str; 0] = [];
        assert_eq!(matcher.best_match("anything", &candidates), (None, 0));
    }

    #[test]
    fn test_build_mapping_maps_back_to_original_column() {
        let matcher = FuzzyMatcher::default();
        let mapping = matcher.build_mapping(
            &tokens(&["Product Name", "product_code", "Unrelated"]),
            &fields(&["Product Name", "Product Code", "W1"]),
            &BTreeMap::new(),
        );

        assert_eq!(
            mapping.get("Product Name"),
            Some(&FieldMatch {
                field: Some("Product Name".to_string()),
                score: 100
            })
        );
        assert_eq!(
            mapping.get("product_code").and_then(|m| m.field.as_deref()),
            Some("Product Code")
        );
        assert_eq!(mapping.get("Unrelated"), Some(&FieldMatch::unmatched()));
        assert_eq!(mapping.resolved().count(), 2);
    }

    #[test]
    fn test_build_mapping_override_wins() {
        let matcher = FuzzyMatcher::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("Code".to_string(), "SKU".to_string());

        let mapping =
            matcher.build_mapping(&tokens(&["Code"]), &fields(&["Code", "SKU"]), &overrides);
        assert_eq!(
            mapping.get("Code"),
            Some(&FieldMatch {
                field: Some("SKU".to_string()),
                score: OVERRIDE_SCORE
            })
        );
    }

    #[test]
    fn test_build_mapping_unknown_override_falls_back() {
        let matcher = FuzzyMatcher::default();
        let mut overrides = BTreeMap::new();
        overrides.insert("Code".to_string(), "Missing".to_string());

        let mapping = matcher.build_mapping(&tokens(&["Code"]), &fields(&["Code"]), &overrides);
        assert_eq!(
            mapping.get("Code").and_then(|m| m.field.as_deref()),
            Some("Code")
        );
    }
}
