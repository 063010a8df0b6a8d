//! Token weighting engine
//!
//! Converts per-category token counts into TF-IDF-style weights where the
//! "documents" are categories. Generic tokens never get a weight, and a token
//! that shows up in three or more categories is dropped unless it is on the
//! strong-token list.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::{TrainingParams, Vocabulary};
use crate::models::{round_to, KeywordTable, TokenCountTable, TokenWeightTable};

/// Category-frequency at which a non-strong token is considered ambiguous
const AMBIGUOUS_CATEGORY_FREQUENCY: usize = 3;

/// Builds weight tables from token statistics
#[derive(Debug, Clone, Copy)]
pub struct TokenWeighter<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> TokenWeighter<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Score every token of every category and keep the `top_n` best per category
    ///
    /// `tf = count / tokens_in_category`, `idf = ln((1 + C) / (1 + df)) + 1`
    /// where `df` is the number of categories containing the token.
    pub fn build_token_weights(
        &self,
        token_counts: &TokenCountTable,
        min_count: u32,
        top_n: usize,
    ) -> TokenWeightTable {
        if token_counts.is_empty() {
            return TokenWeightTable::new();
        }

        let num_categories = token_counts.len() as f64;
        let mut category_frequency: HashMap<&str, usize> = HashMap::new();
        for tokens in token_counts.values() {
            for token in tokens.keys() {
                *category_frequency.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let mut weights = TokenWeightTable::new();
        for (category, tokens) in token_counts {
            let total: u32 = tokens.values().sum();
            let total = if total == 0 { 1.0 } else { total as f64 };

            let mut scored: Vec<(&str, f64)> = Vec::new();
            for (token, &count) in tokens {
                if count < min_count || self.vocabulary.is_generic(token) {
                    continue;
                }
                let df = category_frequency.get(token.as_str()).copied().unwrap_or(1);
                if df >= AMBIGUOUS_CATEGORY_FREQUENCY && !self.vocabulary.is_strong(token) {
                    continue;
                }
                let tf = count as f64 / total;
                let idf = ((1.0 + num_categories) / (1.0 + df as f64)).ln() + 1.0;
                scored.push((token.as_str(), tf * idf));
            }

            // Stable sort over alphabetical input keeps ties deterministic
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            let kept: BTreeMap<String, f64> = scored
                .into_iter()
                .take(top_n)
                .map(|(token, score)| (token.to_string(), round_to(score, 4)))
                .collect();

            debug!(category = %category, tokens = kept.len(), "Built token weights");
            weights.insert(category.clone(), kept);
        }

        weights
    }

    /// Merge curated keywords with a decaying synthetic weight
    ///
    /// Existing learned weights are never overwritten. The weight starts at
    /// `curated_weight_start` and drops by `curated_weight_step` for each token
    /// actually added, never below `curated_weight_floor`.
    pub fn merge_curated_weights(&self, weights: &mut TokenWeightTable, params: &TrainingParams) {
        for (category, extra) in self.curated_tokens() {
            let entry = weights.entry(category).or_default();
            let mut current = params.curated_weight_start;
            for token in extra {
                if entry.contains_key(&token) {
                    continue;
                }
                entry.insert(token, round_to(current, 4));
                current = (current - params.curated_weight_step).max(params.curated_weight_floor);
            }
        }
    }

    /// Append curated keywords to an auditable keyword list, skipping duplicates
    pub fn merge_curated_keywords(&self, keywords: &mut KeywordTable) {
        for (category, extra) in self.curated_tokens() {
            let list = keywords.entry(category).or_default();
            for token in extra {
                if !list.contains(&token) {
                    list.push(token);
                }
            }
        }
    }

    /// Curated keywords normalized into token form, categories with none dropped
    ///
    /// Stopwords and generic tokens are skipped, so curated lists can never
    /// reintroduce a token the learned weights exclude.
    fn curated_tokens(&self) -> Vec<(String, Vec<String>)> {
        self.vocabulary
            .curated_keywords
            .iter()
            .filter_map(|(category, raw)| {
                let tokens: Vec<String> = raw
                    .iter()
                    .filter(|t| t.chars().count() > 2)
                    .map(|t| normalize_keyword(t))
                    .filter(|t| {
                        !t.is_empty()
                            && !self.vocabulary.is_stopword(t)
                            && !self.vocabulary.is_generic(t)
                    })
                    .collect();
                if tokens.is_empty() {
                    None
                } else {
                    Some((category.clone(), tokens))
                }
            })
            .collect()
    }
}

/// Token names of each category ordered by descending weight
pub fn select_top_tokens(weights: &TokenWeightTable, top_n: usize) -> KeywordTable {
    weights
        .iter()
        .map(|(category, tokens)| {
            let mut sorted: Vec<(&String, &f64)> = tokens.iter().collect();
            sorted.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(Ordering::Equal));
            let names = sorted
                .into_iter()
                .take(top_n)
                .map(|(token, _)| token.clone())
                .collect();
            (category.clone(), names)
        })
        .collect()
}

/// Lower-case, map anything outside `[a-z0-9_]` to `_`, trim underscores
fn normalize_keyword(raw: &str) -> String {
    let mapped: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    mapped.trim_matches('_').replace("__", "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;

    fn counts(entries: &[(&str, &[(&str, u32)])]) -> TokenCountTable {
        entries
            .iter()
            .map(|(category, tokens)| {
                (
                    category.to_string(),
                    tokens.iter().map(|(t, c)| (t.to_string(), *c)).collect(),
                )
            })
            .collect()
    }

    fn vocab() -> Vocabulary {
        ScoringConfig::embedded().unwrap().vocabulary
    }

    #[test]
    fn test_empty_counts() {
        let vocab = vocab();
        let weighter = TokenWeighter::new(&vocab);
        assert!(weighter
            .build_token_weights(&TokenCountTable::new(), 2, 10)
            .is_empty());
    }

    #[test]
    fn test_tf_idf_values() {
        let vocab = Vocabulary::default();
        let weighter = TokenWeighter::new(&vocab);
        let table = counts(&[
            ("Rent", &[("landlord", 6), ("apartment", 4)]),
            ("Food", &[("grocer", 5), ("apartment", 5)]),
        ]);

        let weights = weighter.build_token_weights(&table, 2, 10);

        // landlord: tf 0.6, df 1 -> idf ln(3/2)+1
        let expected = 0.6 * ((3.0_f64 / 2.0).ln() + 1.0);
        assert_eq!(weights["Rent"]["landlord"], round_to(expected, 4));
        // apartment: tf 0.4, df 2 -> idf 1
        assert_eq!(weights["Rent"]["apartment"], 0.4);
        assert_eq!(weights["Food"]["apartment"], 0.5);
    }

    #[test]
    fn test_min_count_and_generic_excluded() {
        let vocab = vocab();
        let weighter = TokenWeighter::new(&vocab);
        let table = counts(&[("Tech", &[("software", 1), ("subscription", 9), ("cloud", 3)])]);

        let weights = weighter.build_token_weights(&table, 2, 10);
        let tech = &weights["Tech"];
        assert!(!tech.contains_key("software"));
        assert!(!tech.contains_key("subscription"));
        assert!(tech.contains_key("cloud"));
    }

    #[test]
    fn test_ambiguous_tokens_dropped_unless_strong() {
        let vocab = vocab();
        let weighter = TokenWeighter::new(&vocab);
        let table = counts(&[
            ("Rent", &[("rent", 5), ("store", 5), ("landlord", 5)]),
            ("Food", &[("rent", 2), ("store", 5)]),
            ("Shopping", &[("rent", 2), ("store", 5), ("mall", 5)]),
        ]);

        let weights = weighter.build_token_weights(&table, 2, 10);
        for tokens in weights.values() {
            assert!(!tokens.contains_key("store"));
            assert!(tokens.contains_key("rent"));
        }
        assert!(weights["Rent"].contains_key("landlord"));
    }

    #[test]
    fn test_top_n_cap() {
        let vocab = Vocabulary::default();
        let weighter = TokenWeighter::new(&vocab);
        let table = counts(&[("Food", &[("aaa", 2), ("bbb", 3), ("ccc", 4), ("ddd", 5)])]);

        let weights = weighter.build_token_weights(&table, 2, 2);
        let food = &weights["Food"];
        assert_eq!(food.len(), 2);
        assert!(food.contains_key("ddd"));
        assert!(food.contains_key("ccc"));
    }

    #[test]
    fn test_select_top_tokens_orders_by_weight() {
        let mut weights = TokenWeightTable::new();
        weights.insert(
            "Coffee".to_string(),
            [("latte", 0.2), ("espresso", 0.5), ("brew", 0.1)]
                .iter()
                .map(|(t, w)| (t.to_string(), *w))
                .collect(),
        );

        let keywords = select_top_tokens(&weights, 2);
        assert_eq!(keywords["Coffee"], vec!["espresso", "latte"]);
    }

    #[test]
    fn test_merge_curated_weights_decays_and_preserves_learned() {
        let mut vocab = Vocabulary::default();
        vocab.stopwords.insert("bill".to_string());
        vocab.curated_keywords.insert(
            "Utilities".to_string(),
            vec![
                "water".to_string(),
                "Power Grid".to_string(),
                "bill".to_string(),
                "meter".to_string(),
                "ab".to_string(),
            ],
        );
        let weighter = TokenWeighter::new(&vocab);
        let params = TrainingParams::default();

        let mut weights = TokenWeightTable::new();
        weights
            .entry("Utilities".to_string())
            .or_default()
            .insert("water".to_string(), 0.9);

        weighter.merge_curated_weights(&mut weights, &params);
        let utilities = &weights["Utilities"];
        assert_eq!(utilities["water"], 0.9);
        assert_eq!(utilities["power_grid"], 0.15);
        assert_eq!(utilities["meter"], 0.145);
        assert!(!utilities.contains_key("bill"));
        assert!(!utilities.contains_key("ab"));
    }

    #[test]
    fn test_curated_weight_floor() {
        let mut vocab = Vocabulary::default();
        let many: Vec<String> = (0..40).map(|i| format!("token{}x", i)).collect();
        vocab.curated_keywords.insert("Misc".to_string(), many);
        let weighter = TokenWeighter::new(&vocab);

        let mut weights = TokenWeightTable::new();
        weighter.merge_curated_weights(&mut weights, &TrainingParams::default());
        let min = weights["Misc"]
            .values()
            .cloned()
            .fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.05);
        assert_eq!(weights["Misc"]["token0x"], 0.15);
    }

    #[test]
    fn test_curated_merge_skips_generic_tokens() {
        let vocab = vocab();
        assert!(vocab.is_generic("subscription"));
        let weighter = TokenWeighter::new(&vocab);

        let mut weights = TokenWeightTable::new();
        let mut keywords = KeywordTable::new();
        weighter.merge_curated_weights(&mut weights, &TrainingParams::default());
        weighter.merge_curated_keywords(&mut keywords);

        assert_eq!(weights["Tech"]["software"], 0.15);
        // "subscription" sits second in the Tech list and must not consume a decay step
        assert_eq!(weights["Tech"]["saas"], 0.145);
        assert!(!keywords["Tech"].contains(&"subscription".to_string()));
        for (category, tokens) in &weights {
            for token in tokens.keys() {
                assert!(!vocab.is_generic(token), "{} kept generic {}", category, token);
            }
        }
    }

    #[test]
    fn test_merge_curated_keywords_appends_without_duplicates() {
        let vocab = vocab();
        let weighter = TokenWeighter::new(&vocab);
        let mut keywords = KeywordTable::new();
        keywords.insert("Rent".to_string(), vec!["landlord".to_string(), "flat".to_string()]);

        weighter.merge_curated_keywords(&mut keywords);
        let rent = &keywords["Rent"];
        assert_eq!(rent[0], "landlord");
        assert_eq!(rent[1], "flat");
        assert_eq!(rent[2], "rent");
        assert_eq!(rent.iter().filter(|t| *t == "landlord").count(), 1);
        assert!(keywords.contains_key("Travel"));
    }

    #[test]
    fn test_normalize_keyword() {
        assert_eq!(normalize_keyword("Best Buy"), "best_buy");
        assert_eq!(normalize_keyword("_top-up_"), "top_up");
        assert_eq!(normalize_keyword("hotel_meal"), "hotel_meal");
    }
}
