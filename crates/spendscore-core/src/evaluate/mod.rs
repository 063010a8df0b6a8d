//! Evaluation harness
//!
//! Each `evaluate_*` function splits its dataset, trains on the training part
//! with the same builders the exporters use, scores the held-out part and
//! returns a flat metrics record. Degenerate input (no rows, empty test split)
//! yields the all-zero record, never an error.
//!
//! ## Splits
//!
//! - Classification, forecasting and anomaly thresholds use [`time_split`]
//!   so the test rows are always the most recent ones.
//! - Allocator and goal predictor use [`random_split`] with the configured
//!   seed; their rows carry no meaningful order.

pub mod metrics;
pub mod split;

pub use metrics::{
    confusion_matrix, f1_metrics, top_k_accuracy, ConfusionMatrix, F1Summary, LabelScores,
    OTHER_LABEL,
};
pub use split::{random_split, time_split, train_cutoff};

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::budget::{income_bracket, savings_rates};
use crate::categorizer::{build_scoring_tables, CategoryScorer};
use crate::config::ScoringConfig;
use crate::dataset::title_case;
use crate::models::{
    round_to, safe_div, BudgetShareRow, GoalRecord, Observation, Transaction, FALLBACK_CATEGORY,
};
use crate::robust::{amounts_by_category, build_robust_stats, mean, percentile};
use crate::seasonal::build_seasonal_profiles;

/// Percentile above which a test amount counts as a true anomaly
const ANOMALY_LABEL_PERCENTILE: f64 = 95.0;
/// Percentile above which a test amount is flagged
const ANOMALY_ALERT_PERCENTILE: f64 = 90.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub samples: usize,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    /// Share of samples whose label is within the top-k ranking
    pub top3_accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub samples: usize,
    pub mae: f64,
    pub mape: f64,
    pub directional_accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocatorMetrics {
    pub samples: usize,
    pub rmse: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalMetrics {
    pub samples: usize,
    pub brier: f64,
    pub mae: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyMetrics {
    pub samples: usize,
    pub precision: f64,
    pub recall: f64,
    pub alert_rate: f64,
}

/// Metrics of any model, serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelMetrics {
    Classification(ClassificationMetrics),
    Forecast(ForecastMetrics),
    Anomaly(AnomalyMetrics),
    Goal(GoalMetrics),
    Allocator(AllocatorMetrics),
}

impl ModelMetrics {
    pub fn samples(&self) -> usize {
        match self {
            ModelMetrics::Classification(m) => m.samples,
            ModelMetrics::Forecast(m) => m.samples,
            ModelMetrics::Anomaly(m) => m.samples,
            ModelMetrics::Goal(m) => m.samples,
            ModelMetrics::Allocator(m) => m.samples,
        }
    }
}

/// Train the categorizer on the older rows and classify the newest ones
pub fn evaluate_transaction_categorizer(
    dataset: &[Transaction],
    config: &ScoringConfig,
) -> ClassificationMetrics {
    let params = &config.training;
    let (train, test) = time_split(dataset, params.test_frac);
    if test.is_empty() {
        return ClassificationMetrics::default();
    }

    let artifact = build_scoring_tables(&train, config);
    let scorer = CategoryScorer::new(&artifact, &config.vocabulary);

    let mut y_true = Vec::with_capacity(test.len());
    let mut y_pred = Vec::with_capacity(test.len());
    let mut top_k = Vec::with_capacity(test.len());
    for tx in &test {
        let ranked = scorer.rank(&tx.description, tx.amount);
        let predicted = ranked
            .first()
            .map(|(category, _)| category.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
        y_pred.push(predicted);
        top_k.push(
            ranked
                .into_iter()
                .take(params.top_k)
                .map(|(category, _)| category)
                .collect::<Vec<_>>(),
        );
        y_true.push(title_case(tx.category.trim()));
    }

    let f1 = f1_metrics(&y_true, &y_pred);
    let result = ClassificationMetrics {
        samples: y_true.len(),
        macro_f1: f1.macro_f1,
        weighted_f1: f1.weighted_f1,
        top3_accuracy: top_k_accuracy(&y_true, &top_k),
        confusion_matrix: confusion_matrix(&y_true, &y_pred, params.confusion_top_n),
    };
    info!(
        samples = result.samples,
        macro_f1 = result.macro_f1,
        "Evaluated transaction categorizer"
    );
    result
}

/// Forecast monthly totals of the held-out period from training-period profiles
///
/// Test amounts are summed per (category, calendar month). Directional
/// accuracy compares, for consecutive months of one category, the sign of
/// `prediction - previous actual` with the sign of `actual - previous actual`.
pub fn evaluate_spending_forecaster<O: Observation + Clone>(
    rows: &[O],
    config: &ScoringConfig,
) -> ForecastMetrics {
    let (train, test) = time_split(rows, config.training.test_frac);
    if test.is_empty() {
        return ForecastMetrics::default();
    }

    let profiles = build_seasonal_profiles(&train);

    let mut monthly: BTreeMap<&str, BTreeMap<u32, f64>> = BTreeMap::new();
    for row in &test {
        *monthly
            .entry(row.category())
            .or_default()
            .entry(row.date().month())
            .or_insert(0.0) += row.amount().abs();
    }

    let mut errors = Vec::new();
    let mut ape = Vec::new();
    let mut directional_hits = 0usize;
    let mut directional_total = 0usize;

    for (category, months) in &monthly {
        let profile = profiles.get(*category);
        let mut previous_actual: Option<f64> = None;
        for (&month, &actual) in months {
            let prediction = profile.map(|p| p.forecast(month)).unwrap_or(0.0);
            let error = (actual - prediction).abs();
            errors.push(error);
            ape.push(safe_div(error, actual));

            if let Some(previous) = previous_actual {
                let predicted_up = prediction - previous >= 0.0;
                let actual_up = actual - previous >= 0.0;
                if predicted_up == actual_up {
                    directional_hits += 1;
                }
                directional_total += 1;
            }
            previous_actual = Some(actual);
        }
    }

    let result = ForecastMetrics {
        samples: errors.len(),
        mae: round_to(mean(&errors).unwrap_or(0.0), 4),
        mape: round_to(mean(&ape).unwrap_or(0.0), 4),
        directional_accuracy: round_to(
            safe_div(directional_hits as f64, directional_total as f64),
            4,
        ),
    };
    info!(samples = result.samples, mae = result.mae, "Evaluated spending forecaster");
    result
}

/// Predict every test row's shares with the training-row averages
///
/// Categories missing from a row count as a zero share. The error of a row is
/// the RMSE across every category seen in any row; the metric is its mean.
pub fn evaluate_budget_allocator(
    rows: &[BudgetShareRow],
    config: &ScoringConfig,
) -> AllocatorMetrics {
    if rows.is_empty() {
        return AllocatorMetrics::default();
    }
    let params = &config.training;
    let (train, test) = random_split(rows, params.test_frac, params.split_seed);
    if test.is_empty() {
        return AllocatorMetrics::default();
    }

    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    let share = |row: &BudgetShareRow, column: &str| row.get(column).copied().unwrap_or(0.0);

    let averages: BTreeMap<&str, f64> = columns
        .iter()
        .map(|&column| {
            let values: Vec<f64> = train.iter().map(|row| share(row, column)).collect();
            (column, mean(&values).unwrap_or(0.0))
        })
        .collect();

    let rmses: Vec<f64> = test
        .iter()
        .map(|row| {
            let squared: Vec<f64> = averages
                .iter()
                .map(|(column, predicted)| (predicted - share(row, column)).powi(2))
                .collect();
            mean(&squared).map(f64::sqrt).unwrap_or(0.0)
        })
        .collect();

    let result = AllocatorMetrics {
        samples: test.len(),
        rmse: round_to(mean(&rmses).unwrap_or(0.0), 4),
    };
    info!(samples = result.samples, rmse = result.rmse, "Evaluated budget allocator");
    result
}

/// Predict each test respondent's savings rate from their income bracket
///
/// Respondents outside every bracket, or in a bracket with no training rows,
/// are predicted a rate of 0.
pub fn evaluate_goal_predictor(records: &[GoalRecord], config: &ScoringConfig) -> GoalMetrics {
    if records.is_empty() {
        return GoalMetrics::default();
    }
    let params = &config.training;
    let (train, test) = random_split(records, params.test_frac, params.split_seed);
    if test.is_empty() {
        return GoalMetrics::default();
    }

    let rates = savings_rates(&train);
    let mut squared = Vec::with_capacity(test.len());
    let mut absolute = Vec::with_capacity(test.len());
    for record in &test {
        let predicted = income_bracket(record.income)
            .and_then(|bracket| rates.get(bracket).copied())
            .unwrap_or(0.0);
        let actual = record.desired_savings_percentage / 100.0;
        squared.push((predicted - actual).powi(2));
        absolute.push((predicted - actual).abs());
    }

    let result = GoalMetrics {
        samples: test.len(),
        brier: round_to(mean(&squared).unwrap_or(0.0), 4),
        mae: round_to(mean(&absolute).unwrap_or(0.0), 4),
    };
    info!(samples = result.samples, brier = result.brier, "Evaluated goal predictor");
    result
}

/// Alert quality on the held-out period
///
/// Both the ground truth (above the category's 95th percentile) and the
/// alert (above its 90th percentile) are derived from the test amounts
/// themselves. Training-period stats are built but do not feed the score.
pub fn evaluate_anomaly_detector<O: Observation + Clone>(
    rows: &[O],
    config: &ScoringConfig,
) -> AnomalyMetrics {
    let (train, test) = time_split(rows, config.training.test_frac);
    if train.is_empty() || test.is_empty() {
        return AnomalyMetrics::default();
    }

    let train_stats = build_robust_stats(&train, config.training.robust_min_samples);
    debug!(categories = train_stats.len(), "Built training-period robust stats");

    let mut labels = Vec::new();
    let mut alerts = Vec::new();
    for amounts in amounts_by_category(&test).values() {
        let (Some(label_threshold), Some(alert_threshold)) = (
            percentile(amounts, ANOMALY_LABEL_PERCENTILE),
            percentile(amounts, ANOMALY_ALERT_PERCENTILE),
        ) else {
            continue;
        };
        for &amount in amounts {
            labels.push(amount > label_threshold);
            alerts.push(amount > alert_threshold);
        }
    }

    if labels.is_empty() {
        return AnomalyMetrics::default();
    }

    let pairs = || labels.iter().zip(&alerts);
    let tp = pairs().filter(|&(&l, &a)| l && a).count() as f64;
    let fp = pairs().filter(|&(&l, &a)| !l && a).count() as f64;
    let fn_ = pairs().filter(|&(&l, &a)| l && !a).count() as f64;
    let alerted = alerts.iter().filter(|&&a| a).count() as f64;

    let result = AnomalyMetrics {
        samples: labels.len(),
        precision: round_to(safe_div(tp, tp + fp), 4),
        recall: round_to(safe_div(tp, tp + fn_), 4),
        alert_rate: round_to(safe_div(alerted, labels.len() as f64), 4),
    };
    info!(
        samples = result.samples,
        alert_rate = result.alert_rate,
        "Evaluated anomaly detector"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpendingRecord;
    use chrono::NaiveDate;

    fn spend(category: &str, year: i32, month: u32, day: u32, amount: f64) -> SpendingRecord {
        SpendingRecord {
            date: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            category: category.to_string(),
            amount,
        }
    }

    fn share_row(entries: &[(&str, f64)]) -> BudgetShareRow {
        entries.iter().map(|(c, v)| (c.to_string(), *v)).collect()
    }

    #[test]
    fn test_empty_inputs_give_zeroed_metrics() {
        let config = ScoringConfig::default();
        let none_tx: Vec<Transaction> = Vec::new();
        let none_spend: Vec<SpendingRecord> = Vec::new();

        assert_eq!(
            evaluate_transaction_categorizer(&none_tx, &config),
            ClassificationMetrics::default()
        );
        assert_eq!(
            evaluate_spending_forecaster(&none_spend, &config),
            ForecastMetrics::default()
        );
        assert_eq!(evaluate_budget_allocator(&[], &config), AllocatorMetrics::default());
        assert_eq!(evaluate_goal_predictor(&[], &config), GoalMetrics::default());
        assert_eq!(
            evaluate_anomaly_detector(&none_spend, &config),
            AnomalyMetrics::default()
        );
    }

    #[test]
    fn test_forecaster_perfect_constant_spend() {
        let config = ScoringConfig::default();
        // One 10.0 spend per day for January..May; test covers the tail
        let mut rows = Vec::new();
        for month in 1..=5 {
            for day in 1..=30 {
                rows.push(spend("Food", 2024, month, day.min(28), 10.0));
            }
        }
        let metrics = evaluate_spending_forecaster(&rows, &config);
        assert_eq!(metrics.samples, 1);
        // May test rows: 30 of 10.0 -> actual 300, baseline 10 * 30
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.mape, 0.0);
        assert_eq!(metrics.directional_accuracy, 0.0);
    }

    #[test]
    fn test_forecaster_unknown_category_predicts_zero() {
        let config = ScoringConfig::default();
        let mut rows: Vec<SpendingRecord> = (1..=8).map(|d| spend("Food", 2024, 1, d, 5.0)).collect();
        rows.push(spend("Travel", 2024, 3, 1, 100.0));
        rows.push(spend("Travel", 2024, 4, 1, 50.0));

        let metrics = evaluate_spending_forecaster(&rows, &config);
        assert_eq!(metrics.samples, 2);
        assert_eq!(metrics.mae, 75.0);
        assert_eq!(metrics.mape, 1.0);
        // prediction 0 - 100 < 0 and 50 - 100 < 0
        assert_eq!(metrics.directional_accuracy, 1.0);
    }

    #[test]
    fn test_allocator_identical_rows_have_zero_error() {
        let config = ScoringConfig::default();
        let rows: Vec<BudgetShareRow> = (0..10)
            .map(|_| share_row(&[("Rent", 0.5), ("Food", 0.3), ("Transport", 0.2)]))
            .collect();
        let metrics = evaluate_budget_allocator(&rows, &config);
        assert_eq!(metrics.samples, 2);
        assert_eq!(metrics.rmse, 0.0);
    }

    #[test]
    fn test_allocator_missing_category_counts_as_zero() {
        let config = ScoringConfig::default();
        let mut rows: Vec<BudgetShareRow> = (0..9).map(|_| share_row(&[("Rent", 1.0)])).collect();
        rows.push(share_row(&[("Food", 1.0)]));
        let metrics = evaluate_budget_allocator(&rows, &config);
        assert_eq!(metrics.samples, 2);
        assert!(metrics.rmse > 0.0);
    }

    #[test]
    fn test_goal_predictor_constant_rates() {
        let config = ScoringConfig::default();
        let records: Vec<GoalRecord> = (0..20)
            .map(|i| GoalRecord {
                income: 30_000.0 + i as f64,
                desired_savings_percentage: 25.0,
            })
            .collect();
        let metrics = evaluate_goal_predictor(&records, &config);
        assert_eq!(metrics.samples, 4);
        assert_eq!(metrics.brier, 0.0);
        assert_eq!(metrics.mae, 0.0);
    }

    #[test]
    fn test_goal_predictor_out_of_bracket_predicts_zero() {
        let config = ScoringConfig::default();
        let records: Vec<GoalRecord> = (0..5)
            .map(|_| GoalRecord {
                income: -10.0,
                desired_savings_percentage: 50.0,
            })
            .collect();
        let metrics = evaluate_goal_predictor(&records, &config);
        assert_eq!(metrics.samples, 1);
        assert_eq!(metrics.mae, 0.5);
        assert_eq!(metrics.brier, 0.25);
    }

    #[test]
    fn test_anomaly_thresholds_come_from_test_split() {
        let config = ScoringConfig::default();
        let mut rows: Vec<SpendingRecord> = (1..=20).map(|d| spend("Food", 2024, 1, d, 10.0)).collect();
        // Test split: the last 5 rows by date
        for (day, amount) in [(21, 1.0), (22, 2.0), (23, 3.0), (24, 4.0), (25, 100.0)] {
            rows.push(spend("Food", 2024, 1, day, amount));
        }

        let metrics = evaluate_anomaly_detector(&rows, &config);
        assert_eq!(metrics.samples, 5);
        // p95 and p90 of [1,2,3,4,100] both sit between 4 and 100
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.alert_rate, 0.2);
    }

    #[test]
    fn test_anomaly_needs_training_rows() {
        let config = ScoringConfig::default();
        let rows = vec![spend("Food", 2024, 1, 1, 10.0)];
        assert_eq!(evaluate_anomaly_detector(&rows, &config), AnomalyMetrics::default());
    }

    #[test]
    fn test_model_metrics_serialize_flat() {
        let metrics = ModelMetrics::Allocator(AllocatorMetrics {
            samples: 3,
            rmse: 0.1,
        });
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["samples"], 3);
        assert_eq!(json["rmse"], 0.1);
        assert_eq!(metrics.samples(), 3);
    }
}
