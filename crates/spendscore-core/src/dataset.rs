//! Dataset cleaning
//!
//! Normalises raw imported rows and drops the ones that fail the configured
//! filters. Rows are rejected, never coerced into range.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{DatasetFilters, ScoringConfig, Vocabulary};
use crate::models::{SpendingRecord, Transaction, FALLBACK_CATEGORY};
use crate::robust::percentile;
use crate::sampling::SeededRng;

static CATEGORY_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s_&/-]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse whitespace runs to one space and trim
pub fn normalize_description(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

/// Whether at least `min_ratio` of the characters are ASCII; empty text never is
pub fn is_english_like(text: &str, min_ratio: f64) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let ascii = text.chars().filter(char::is_ascii).count();
    ascii as f64 / total as f64 >= min_ratio
}

pub fn is_valid_amount(value: f64, filters: &DatasetFilters) -> bool {
    value >= filters.min_amount && value <= filters.max_amount
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if previous_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(c);
            previous_alpha = false;
        }
    }
    out
}

/// Map a free-form category label onto the closed category set
///
/// Exact alias match first, then the first alias (in configured order) that
/// prefixes the normalised key, otherwise the label title-cased.
pub fn normalize_category(raw: &str, vocabulary: &Vocabulary) -> String {
    if raw.is_empty() {
        return FALLBACK_CATEGORY.to_string();
    }

    let lowered = raw.to_lowercase();
    let stripped = CATEGORY_NOISE.replace_all(&lowered, "");
    let spaced = stripped.trim().replace(['_', '-'], " ");
    let key = WHITESPACE.replace_all(&spaced, " ");

    if let Some(category) = vocabulary.alias(&key) {
        return category.to_string();
    }
    // TODO: prefix matching lets short aliases capture unrelated labels
    // ("gas" matches "gasoline station fees"); revisit with token matching
    if let Some((_, category)) = vocabulary
        .category_aliases
        .iter()
        .find(|(alias, _)| key.starts_with(alias.as_str()))
    {
        return category.clone();
    }
    title_case(raw.trim())
}

/// Clip every value into the `[lower_q, upper_q]` quantile range of the slice
pub fn clip_outliers(values: &[f64], lower_q: f64, upper_q: f64) -> Vec<f64> {
    let (Some(lower), Some(upper)) = (
        percentile(values, lower_q * 100.0),
        percentile(values, upper_q * 100.0),
    ) else {
        return Vec::new();
    };
    values.iter().map(|v| v.max(lower).min(upper)).collect()
}

/// Drop rare categories and down-sample large ones
///
/// Output is grouped by category in name order. A single seeded generator is
/// used across categories, so the sample depends only on input and seed.
pub fn balance_categories(rows: Vec<Transaction>, filters: &DatasetFilters) -> Vec<Transaction> {
    let mut groups: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.category.clone()).or_default().push(row);
    }

    let mut rng = SeededRng::new(filters.seed);
    let mut balanced = Vec::new();
    for (category, mut group) in groups {
        if group.len() < filters.min_category_count {
            debug!(category = %category, rows = group.len(), "Dropping rare category");
            continue;
        }
        if group.len() > filters.max_category_count {
            let picked = rng.sample_indices(group.len(), filters.max_category_count);
            let mut slots: Vec<Option<Transaction>> = group.drain(..).map(Some).collect();
            group = picked
                .into_iter()
                .filter_map(|i| slots[i].take())
                .collect();
            debug!(category = %category, rows = group.len(), "Down-sampled category");
        }
        balanced.extend(group);
    }
    balanced
}

/// Normalise and filter labeled transactions, then balance categories
pub fn clean_transactions(rows: Vec<Transaction>, config: &ScoringConfig) -> Vec<Transaction> {
    let filters = &config.filters;
    let vocabulary = &config.vocabulary;
    let total = rows.len();

    let kept: Vec<Transaction> = rows
        .into_iter()
        .filter_map(|mut tx| {
            let category = tx.category.trim();
            if category.is_empty() {
                return None;
            }
            tx.category = normalize_category(category, vocabulary);
            tx.description = normalize_description(&tx.description);
            Some(tx)
        })
        .filter(|tx| is_valid_amount(tx.amount.abs(), filters))
        .filter(|tx| vocabulary.is_allowed_category(&tx.category))
        .filter(|tx| is_english_like(&tx.description, filters.english_like_ratio))
        .filter(|tx| tx.description.split_whitespace().count() >= filters.min_description_tokens)
        .collect();

    let filtered = kept.len();
    let balanced = balance_categories(kept, filters);
    info!(
        input = total,
        filtered,
        output = balanced.len(),
        "Cleaned transaction dataset"
    );
    balanced
}

/// Normalise and filter spending rows for forecasting
///
/// Amounts become absolute and are clipped to the configured quantiles of the
/// whole column; categories need enough rows and enough distinct months.
pub fn clean_spending(rows: Vec<SpendingRecord>, config: &ScoringConfig) -> Vec<SpendingRecord> {
    let filters = &config.filters;
    let vocabulary = &config.vocabulary;
    let total = rows.len();

    let mut kept: Vec<SpendingRecord> = rows
        .into_iter()
        .filter_map(|mut row| {
            let category = row.category.trim();
            if category.is_empty() {
                return None;
            }
            row.category = normalize_category(category, vocabulary);
            Some(row)
        })
        .filter(|row| is_valid_amount(row.amount.abs(), filters))
        .filter(|row| vocabulary.is_allowed_category(&row.category))
        .collect();

    let amounts: Vec<f64> = kept.iter().map(|row| row.amount.abs()).collect();
    let clipped = clip_outliers(
        &amounts,
        filters.outlier_lower_quantile,
        filters.outlier_upper_quantile,
    );
    for (row, amount) in kept.iter_mut().zip(clipped) {
        row.amount = amount;
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut months: BTreeMap<&str, BTreeSet<(i32, u32)>> = BTreeMap::new();
    for row in &kept {
        *counts.entry(row.category.as_str()).or_insert(0) += 1;
        months
            .entry(row.category.as_str())
            .or_default()
            .insert((row.date.year(), row.date.month()));
    }
    let keep: BTreeSet<String> = counts
        .into_iter()
        .filter(|(category, count)| {
            *count >= filters.min_spending_category_count
                && months.get(category).map_or(0, BTreeSet::len) >= filters.min_spending_months
        })
        .map(|(category, _)| category.to_string())
        .collect();

    kept.retain(|row| keep.contains(&row.category));
    info!(
        input = total,
        output = kept.len(),
        categories = keep.len(),
        "Cleaned spending dataset"
    );
    kept
}
