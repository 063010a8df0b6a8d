//! Training runs: build every requested model table and, for full runs,
//! a report with the evaluation metrics of each model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::budget::{train_budget_allocator, train_goal_predictor, BudgetShareTable, SavingsRateTable};
use crate::categorizer::{train_transaction_categorizer, CategorizerArtifact};
use crate::config::{DatasetFilters, ScoringConfig};
use crate::dataset::{clean_spending, clean_transactions};
use crate::error::Result;
use crate::evaluate::{
    evaluate_anomaly_detector, evaluate_budget_allocator, evaluate_goal_predictor,
    evaluate_spending_forecaster, evaluate_transaction_categorizer, ModelMetrics,
};
use crate::models::{BudgetShareRow, GoalRecord, ModelKind, SpendingRecord, Transaction};
use crate::robust::{train_anomaly_detector, RobustStatsTable};
use crate::seasonal::{train_spending_forecaster, SeasonalProfileTable};

/// One model, or all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelection {
    One(ModelKind),
    All,
}

impl ModelSelection {
    pub fn kinds(&self) -> Vec<ModelKind> {
        match self {
            ModelSelection::One(kind) => vec![*kind],
            ModelSelection::All => ModelKind::all(),
        }
    }

    pub fn includes(&self, kind: ModelKind) -> bool {
        match self {
            ModelSelection::One(selected) => *selected == kind,
            ModelSelection::All => true,
        }
    }
}

impl FromStr for ModelSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "all" {
            Ok(ModelSelection::All)
        } else {
            s.parse().map(ModelSelection::One)
        }
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelection::One(kind) => write!(f, "{}", kind),
            ModelSelection::All => write!(f, "all"),
        }
    }
}

/// Cleaned datasets a run trains from
#[derive(Debug, Clone, Default)]
pub struct TrainingInputs {
    pub transactions: Vec<Transaction>,
    pub spending: Vec<SpendingRecord>,
    pub budget_rows: Vec<BudgetShareRow>,
    pub goals: Vec<GoalRecord>,
}

impl TrainingInputs {
    /// Clean raw transaction and spending rows; share rows and goals pass through
    pub fn from_raw(
        transactions: Vec<Transaction>,
        spending: Vec<SpendingRecord>,
        budget_rows: Vec<BudgetShareRow>,
        goals: Vec<GoalRecord>,
        config: &ScoringConfig,
    ) -> Self {
        Self {
            transactions: clean_transactions(transactions, config),
            spending: clean_spending(spending, config),
            budget_rows,
            goals,
        }
    }

    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            transactions_rows: self.transactions.len(),
            spending_rows: self.spending.len(),
            budget_rows: self.budget_rows.len(),
            goal_rows: self.goals.len(),
        }
    }

    /// SHA-256 over the canonical text form of every row, hex encoded
    ///
    /// Two runs with the same digest trained on bit-identical data.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(b"transactions\n");
        for tx in &self.transactions {
            hasher.update(
                format!(
                    "{}\x1f{}\x1f{:?}\x1f{}\x1f{}\n",
                    tx.date, tx.description, tx.amount, tx.category, tx.kind
                )
                .as_bytes(),
            );
        }

        hasher.update(b"spending\n");
        for row in &self.spending {
            hasher.update(format!("{}\x1f{}\x1f{:?}\n", row.date, row.category, row.amount).as_bytes());
        }

        hasher.update(b"budget\n");
        for row in &self.budget_rows {
            for (category, share) in row {
                hasher.update(format!("{}\x1f{:?}\x1e", category, share).as_bytes());
            }
            hasher.update(b"\n");
        }

        hasher.update(b"goals\n");
        for goal in &self.goals {
            hasher.update(
                format!("{:?}\x1f{:?}\n", goal.income, goal.desired_savings_percentage).as_bytes(),
            );
        }

        hex::encode(hasher.finalize())
    }
}

/// Row counts of the cleaned datasets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub transactions_rows: usize,
    pub spending_rows: usize,
    pub budget_rows: usize,
    pub goal_rows: usize,
}

/// Model tables produced by a run; models not selected stay `None`
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingArtifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_categorizer: Option<CategorizerArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spending_forecaster: Option<SeasonalProfileTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_allocator: Option<BudgetShareTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_predictor: Option<SavingsRateTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_detector: Option<RobustStatsTable>,
}

impl TrainingArtifacts {
    /// Each trained table as a JSON value, keyed by model
    pub fn to_json(&self) -> Result<BTreeMap<ModelKind, serde_json::Value>> {
        let mut out = BTreeMap::new();
        if let Some(table) = &self.transaction_categorizer {
            out.insert(ModelKind::TransactionCategorizer, serde_json::to_value(table)?);
        }
        if let Some(table) = &self.spending_forecaster {
            out.insert(ModelKind::SpendingForecaster, serde_json::to_value(table)?);
        }
        if let Some(table) = &self.budget_allocator {
            out.insert(ModelKind::BudgetAllocator, serde_json::to_value(table)?);
        }
        if let Some(table) = &self.goal_predictor {
            out.insert(ModelKind::GoalPredictor, serde_json::to_value(table)?);
        }
        if let Some(table) = &self.anomaly_detector {
            out.insert(ModelKind::AnomalyDetector, serde_json::to_value(table)?);
        }
        Ok(out)
    }
}

/// Summary written after a full run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub generated_at: DateTime<Utc>,
    pub datasets: DatasetCounts,
    pub filters: DatasetFilters,
    pub allowed_categories: Vec<String>,
    pub metrics: BTreeMap<ModelKind, ModelMetrics>,
    pub dataset_digest: String,
}

/// Output of [`run_training`]
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub artifacts: TrainingArtifacts,
    /// Only present when every model was trained
    pub report: Option<TrainingReport>,
}

/// Train the selected models
pub fn run_training(
    selection: ModelSelection,
    inputs: &TrainingInputs,
    config: &ScoringConfig,
) -> TrainingRun {
    let mut artifacts = TrainingArtifacts::default();

    if selection.includes(ModelKind::TransactionCategorizer) {
        artifacts.transaction_categorizer =
            Some(train_transaction_categorizer(&inputs.transactions, config));
    }
    if selection.includes(ModelKind::SpendingForecaster) {
        artifacts.spending_forecaster = Some(train_spending_forecaster(&inputs.spending));
    }
    if selection.includes(ModelKind::BudgetAllocator) {
        artifacts.budget_allocator = Some(train_budget_allocator(&inputs.budget_rows));
    }
    if selection.includes(ModelKind::GoalPredictor) {
        artifacts.goal_predictor = Some(train_goal_predictor(&inputs.goals));
    }
    if selection.includes(ModelKind::AnomalyDetector) {
        artifacts.anomaly_detector = Some(train_anomaly_detector(&inputs.transactions, config));
    }

    let report = (selection == ModelSelection::All).then(|| {
        let mut allowed_categories: Vec<String> =
            config.vocabulary.allowed_categories.iter().cloned().collect();
        allowed_categories.sort();
        TrainingReport {
            generated_at: Utc::now(),
            datasets: inputs.counts(),
            filters: config.filters.clone(),
            allowed_categories,
            metrics: evaluate(selection, inputs, config),
            dataset_digest: inputs.digest(),
        }
    });

    info!(model = %selection, "Training run complete");
    TrainingRun { artifacts, report }
}

/// Evaluate one model on its dataset
pub fn evaluate_model(kind: ModelKind, inputs: &TrainingInputs, config: &ScoringConfig) -> ModelMetrics {
    match kind {
        ModelKind::TransactionCategorizer => ModelMetrics::Classification(
            evaluate_transaction_categorizer(&inputs.transactions, config),
        ),
        ModelKind::SpendingForecaster => {
            ModelMetrics::Forecast(evaluate_spending_forecaster(&inputs.spending, config))
        }
        ModelKind::BudgetAllocator => {
            ModelMetrics::Allocator(evaluate_budget_allocator(&inputs.budget_rows, config))
        }
        ModelKind::GoalPredictor => ModelMetrics::Goal(evaluate_goal_predictor(&inputs.goals, config)),
        ModelKind::AnomalyDetector => {
            ModelMetrics::Anomaly(evaluate_anomaly_detector(&inputs.transactions, config))
        }
    }
}

/// Evaluate every selected model
pub fn evaluate(
    selection: ModelSelection,
    inputs: &TrainingInputs,
    config: &ScoringConfig,
) -> BTreeMap<ModelKind, ModelMetrics> {
    selection
        .kinds()
        .into_iter()
        .map(|kind| (kind, evaluate_model(kind, inputs, config)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn inputs() -> TrainingInputs {
        let transactions = (0..40)
            .map(|i| Transaction {
                date: NaiveDate::from_ymd_opt(2024, 1 + (i % 12) as u32, 1).unwrap(),
                description: if i % 2 == 0 {
                    "monthly rent landlord".to_string()
                } else {
                    "grocery supermarket".to_string()
                },
                amount: if i % 2 == 0 { 1500.0 } else { 80.0 },
                category: if i % 2 == 0 { "Rent" } else { "Food" }.to_string(),
                kind: Default::default(),
            })
            .collect();
        let spending = (1..=12)
            .map(|m| SpendingRecord {
                date: NaiveDate::from_ymd_opt(2023, m, 10).unwrap(),
                category: "Food".to_string(),
                amount: 100.0,
            })
            .collect();
        let budget_rows = vec![
            [("Rent".to_string(), 0.6), ("Food".to_string(), 0.4)].into_iter().collect(),
            [("Rent".to_string(), 0.5), ("Food".to_string(), 0.5)].into_iter().collect(),
        ];
        let goals = vec![
            GoalRecord {
                income: 30_000.0,
                desired_savings_percentage: 10.0,
            },
            GoalRecord {
                income: 60_000.0,
                desired_savings_percentage: 20.0,
            },
        ];
        TrainingInputs {
            transactions,
            spending,
            budget_rows,
            goals,
        }
    }

    #[test]
    fn test_model_selection_parse() {
        assert_eq!("all".parse::<ModelSelection>().unwrap(), ModelSelection::All);
        assert_eq!(
            "goal_predictor".parse::<ModelSelection>().unwrap(),
            ModelSelection::One(ModelKind::GoalPredictor)
        );
        assert!("everything".parse::<ModelSelection>().is_err());
        assert_eq!(ModelSelection::All.kinds().len(), 5);
    }

    #[test]
    fn test_single_model_run_has_no_report() {
        let config = ScoringConfig::embedded().unwrap();
        let run = run_training(
            ModelSelection::One(ModelKind::BudgetAllocator),
            &inputs(),
            &config,
        );
        assert!(run.report.is_none());
        assert!(run.artifacts.transaction_categorizer.is_none());
        let allocator = run.artifacts.budget_allocator.unwrap();
        assert_eq!(allocator["Rent"], 0.55);

        let json = TrainingArtifacts::default().to_json().unwrap();
        assert!(json.is_empty());
    }

    #[test]
    fn test_full_run_reports_every_model() {
        let config = ScoringConfig::embedded().unwrap();
        let data = inputs();
        let run = run_training(ModelSelection::All, &data, &config);

        let report = run.report.expect("full run has a report");
        assert_eq!(report.metrics.len(), 5);
        assert_eq!(report.datasets.transactions_rows, 40);
        assert_eq!(report.datasets.goal_rows, 2);
        assert_eq!(report.dataset_digest, data.digest());
        assert_eq!(report.dataset_digest.len(), 64);

        let tables = run.artifacts.to_json().unwrap();
        assert_eq!(tables.len(), 5);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"transaction_categorizer\""));
        assert!(json.contains("\"dataset_digest\""));
    }

    #[test]
    fn test_digest_changes_with_data() {
        let a = inputs();
        let mut b = inputs();
        assert_eq!(a.digest(), b.digest());
        b.spending[0].amount += 0.01;
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_evaluate_empty_inputs_is_total() {
        let config = ScoringConfig::embedded().unwrap();
        let metrics = evaluate(ModelSelection::All, &TrainingInputs::default(), &config);
        assert_eq!(metrics.len(), 5);
        assert!(metrics.values().all(|m| m.samples() == 0));
    }
}
