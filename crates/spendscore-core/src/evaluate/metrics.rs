//! Classification quality measures
//!
//! Every ratio with a zero denominator resolves to 0.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{round_to, safe_div};

/// Label used for everything outside the confusion matrix's top labels
///
/// A genuine `Other` category shares this row and column with the overflow.
pub const OTHER_LABEL: &str = "Other";

/// true label -> predicted label -> count
pub type ConfusionMatrix = BTreeMap<String, BTreeMap<String, usize>>;

/// Per-label precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct F1Summary {
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub per_label: BTreeMap<String, LabelScores>,
}

/// Macro (plain mean) and weighted (support-weighted) F1 over the union of labels
///
/// Summary values are rounded to 4 decimals.
pub fn f1_metrics(y_true: &[String], y_pred: &[String]) -> F1Summary {
    let labels: BTreeSet<&str> = y_true
        .iter()
        .chain(y_pred.iter())
        .map(String::as_str)
        .collect();
    if labels.is_empty() {
        return F1Summary::default();
    }

    let mut per_label = BTreeMap::new();
    let mut f1_sum = 0.0;
    let mut weighted_sum = 0.0;

    for &label in &labels {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (yt, yp) in y_true.iter().zip(y_pred) {
            match (yt.as_str() == label, yp.as_str() == label) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let support = y_true.iter().filter(|yt| yt.as_str() == label).count();

        let precision = safe_div(tp as f64, (tp + fp) as f64);
        let recall = safe_div(tp as f64, (tp + fn_) as f64);
        let f1 = safe_div(2.0 * precision * recall, precision + recall);

        f1_sum += f1;
        weighted_sum += f1 * support as f64;
        per_label.insert(
            label.to_string(),
            LabelScores {
                precision,
                recall,
                f1,
                support,
            },
        );
    }

    F1Summary {
        macro_f1: round_to(f1_sum / labels.len() as f64, 4),
        weighted_f1: round_to(safe_div(weighted_sum, y_true.len() as f64), 4),
        per_label,
    }
}

/// Confusion counts restricted to the `top_n` most frequent true labels
///
/// Ties in frequency go to the alphabetically first label. Labels outside the
/// top set, on either axis, are counted under [`OTHER_LABEL`].
pub fn confusion_matrix(y_true: &[String], y_pred: &[String], top_n: usize) -> ConfusionMatrix {
    let mut counts: BTreeMap<&str, usize> = y_true
        .iter()
        .chain(y_pred.iter())
        .map(|label| (label.as_str(), 0))
        .collect();
    for label in y_true {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Stable sort over alphabetical input breaks ties by name
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let top: HashSet<&str> = ranked.into_iter().take(top_n).map(|(l, _)| l).collect();

    let bucket = |label: &str| -> String {
        if top.contains(label) {
            label.to_string()
        } else {
            OTHER_LABEL.to_string()
        }
    };

    let mut matrix = ConfusionMatrix::new();
    for (yt, yp) in y_true.iter().zip(y_pred) {
        *matrix
            .entry(bucket(yt))
            .or_default()
            .entry(bucket(yp))
            .or_insert(0) += 1;
    }
    matrix
}

/// Fraction of samples whose true label is among their ranked candidates
pub fn top_k_accuracy(y_true: &[String], top_k: &[Vec<String>]) -> f64 {
    let hits = y_true
        .iter()
        .zip(top_k)
        .filter(|(label, candidates)| candidates.contains(*label))
        .count();
    round_to(safe_div(hits as f64, y_true.len() as f64), 4)
}
