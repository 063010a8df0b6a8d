//! Category scoring model
//!
//! A linear log-score classifier: for every candidate category the score is
//! `ln(prior) + Σ token weights + amount scale + amount bucket`. The same
//! tables are built for the exported artifact and for evaluation, so the
//! metrics describe exactly what is shipped.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ScoringConfig, Vocabulary};
use crate::dataset::title_case;
use crate::models::{
    round_to, AmountFeatureWeights, AmountWeightTable, CategoryPriors, KeywordTable,
    TokenCountTable, TokenWeightTable, Transaction, FALLBACK_CATEGORY,
};
use crate::tokenize::Tokenizer;
use crate::weights::{select_top_tokens, TokenWeighter};

/// Prior used for a category that has token weights but no prior entry
const MISSING_PRIOR: f64 = 1e-6;

/// Amount at which the scale feature saturates
const AMOUNT_SCALE: f64 = 100_000.0;

const LARGE_AMOUNT: f64 = 10_000.0;
const SMALL_AMOUNT: f64 = 1_000.0;

/// Trained categorizer tables, as exported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizerArtifact {
    pub keywords: KeywordTable,
    pub token_weights: TokenWeightTable,
    pub amount_weights: AmountWeightTable,
    pub priors: CategoryPriors,
}

impl CategorizerArtifact {
    pub fn is_empty(&self) -> bool {
        self.token_weights.is_empty() && self.priors.is_empty()
    }

    /// Every category that takes part in scoring
    pub fn categories(&self) -> BTreeSet<&str> {
        self.token_weights
            .keys()
            .chain(self.priors.keys())
            .map(String::as_str)
            .collect()
    }

    /// Score already-extracted features against every category
    pub fn score_features(&self, features: &[String], amount: f64) -> BTreeMap<String, f64> {
        let magnitude = amount.abs();
        let is_large = magnitude > LARGE_AMOUNT;
        let is_small = magnitude < SMALL_AMOUNT;

        self.categories()
            .into_iter()
            .map(|category| {
                let prior = self.priors.get(category).copied().unwrap_or(MISSING_PRIOR);
                let mut score = prior.ln();

                if let Some(weights) = self.token_weights.get(category) {
                    score += features
                        .iter()
                        .filter_map(|token| weights.get(token))
                        .sum::<f64>();
                }

                if let Some(w) = self.amount_weights.get(category) {
                    score += w.amount * (magnitude / AMOUNT_SCALE).min(1.0);
                    score += if is_large {
                        w.is_large
                    } else if is_small {
                        w.is_small
                    } else {
                        w.is_medium
                    };
                }

                (category.to_string(), score)
            })
            .collect()
    }
}

/// Scores descriptions against an artifact using a fixed vocabulary
#[derive(Debug, Clone, Copy)]
pub struct CategoryScorer<'a> {
    artifact: &'a CategorizerArtifact,
    tokenizer: Tokenizer<'a>,
}

impl<'a> CategoryScorer<'a> {
    pub fn new(artifact: &'a CategorizerArtifact, vocabulary: &'a Vocabulary) -> Self {
        Self {
            artifact,
            tokenizer: Tokenizer::new(vocabulary),
        }
    }

    pub fn scores(&self, description: &str, amount: f64) -> BTreeMap<String, f64> {
        let features = self.tokenizer.features(description);
        self.artifact.score_features(&features, amount)
    }

    /// All categories by descending score, ties broken alphabetically
    pub fn rank(&self, description: &str, amount: f64) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self.scores(description, amount).into_iter().collect();
        // BTreeMap input is alphabetical and the sort is stable
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked
    }

    pub fn predict(&self, description: &str, amount: f64) -> String {
        self.rank(description, amount)
            .into_iter()
            .next()
            .map(|(category, _)| category)
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    /// The first `k` entries of [`rank`](Self::rank)
    pub fn predict_top_k(&self, description: &str, amount: f64, k: usize) -> Vec<String> {
        self.rank(description, amount)
            .into_iter()
            .take(k)
            .map(|(category, _)| category)
            .collect()
    }
}

/// Build the full scoring tables from a labeled dataset
///
/// Categories are title-cased. Only categories with at least
/// `min_category_samples` rows get learned tables and a prior (row share over
/// the whole dataset). Curated keywords are merged afterwards and every
/// category that ends up with keywords or weights receives default amount
/// weights and a synthetic prior, then priors are renormalised.
pub fn build_scoring_tables(dataset: &[Transaction], config: &ScoringConfig) -> CategorizerArtifact {
    if dataset.is_empty() {
        return CategorizerArtifact::default();
    }

    let params = &config.training;
    let vocabulary = &config.vocabulary;
    let tokenizer = Tokenizer::new(vocabulary);
    let weighter = TokenWeighter::new(vocabulary);

    let labels: Vec<String> = dataset
        .iter()
        .map(|tx| title_case(tx.category.trim()))
        .collect();

    let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in &labels {
        *category_counts.entry(label.as_str()).or_insert(0) += 1;
    }
    let total = dataset.len() as f64;

    let mut priors = CategoryPriors::new();
    for (category, &count) in &category_counts {
        if count >= params.min_category_samples {
            priors.insert(category.to_string(), count as f64 / total);
        }
    }

    let mut token_counts = TokenCountTable::new();
    let mut amount_sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (tx, label) in dataset.iter().zip(&labels) {
        if !priors.contains_key(label) {
            continue;
        }
        let sum = amount_sums.entry(label.as_str()).or_insert((0.0, 0));
        sum.0 += tx.amount.abs();
        sum.1 += 1;

        let counts = token_counts.entry(label.clone()).or_default();
        for token in tokenizer.features(&tx.description) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut token_weights =
        weighter.build_token_weights(&token_counts, params.token_min_count, params.token_top_n);
    let mut keywords = select_top_tokens(&token_weights, params.keyword_top_n);

    let mut amount_weights: AmountWeightTable = amount_sums
        .into_iter()
        .map(|(category, (sum, n))| {
            (
                category.to_string(),
                AmountFeatureWeights::from_mean_amount(sum / n as f64),
            )
        })
        .collect();

    weighter.merge_curated_keywords(&mut keywords);
    weighter.merge_curated_weights(&mut token_weights, params);

    let covered: BTreeSet<String> = keywords
        .keys()
        .chain(token_weights.keys())
        .cloned()
        .collect();
    for category in covered {
        amount_weights
            .entry(category.clone())
            .or_insert(AmountFeatureWeights::COVERAGE_DEFAULT);
        priors.entry(category).or_insert(params.synthetic_prior);
    }

    let prior_total: f64 = priors.values().sum();
    if prior_total > 0.0 {
        for prior in priors.values_mut() {
            *prior = round_to(*prior / prior_total, 10);
        }
    }

    debug!(
        categories = priors.len(),
        learned = token_counts.len(),
        "Built scoring tables"
    );

    CategorizerArtifact {
        keywords,
        token_weights,
        amount_weights,
        priors,
    }
}

/// Train the exported transaction categorizer
pub fn train_transaction_categorizer(
    dataset: &[Transaction],
    config: &ScoringConfig,
) -> CategorizerArtifact {
    let artifact = build_scoring_tables(dataset, config);
    info!(
        rows = dataset.len(),
        categories = artifact.priors.len(),
        "Trained transaction categorizer"
    );
    artifact
}
