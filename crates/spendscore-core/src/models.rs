//! Domain models for spendscore

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Category used when nothing else can be decided
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[default]
    Expense,
    Income,
    Other,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "debit" | "withdrawal" => Ok(Self::Expense),
            "income" | "credit" | "deposit" => Ok(Self::Income),
            "other" | "transfer" => Ok(Self::Other),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A labeled transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    /// Signed amount (negative = money out for most sources)
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type", default)]
    pub kind: TransactionType,
}

/// A categorized spend without description, used for forecasting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingRecord {
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
}

/// Anything that carries a date, a category and an amount
pub trait Observation {
    fn date(&self) -> NaiveDate;
    fn category(&self) -> &str;
    fn amount(&self) -> f64;
}

impl Observation for Transaction {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn amount(&self) -> f64 {
        self.amount
    }
}

impl Observation for SpendingRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn amount(&self) -> f64 {
        self.amount
    }
}

/// One household's budget split: category -> share of total (0..=1)
pub type BudgetShareRow = BTreeMap<String, f64>;

/// Income and stated savings goal for one respondent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub income: f64,
    /// Percentage, 0..=100
    pub desired_savings_percentage: f64,
}

/// category -> token -> weight
pub type TokenWeightTable = BTreeMap<String, BTreeMap<String, f64>>;

/// category -> token -> occurrence count
pub type TokenCountTable = BTreeMap<String, BTreeMap<String, u32>>;

/// category -> prior probability
pub type CategoryPriors = BTreeMap<String, f64>;

/// category -> human-auditable keyword list
pub type KeywordTable = BTreeMap<String, Vec<String>>;

/// category -> amount feature weights
pub type AmountWeightTable = BTreeMap<String, AmountFeatureWeights>;

/// Amount-derived feature weights for one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountFeatureWeights {
    /// Scale weight applied to min(|amount| / 100000, 1)
    pub amount: f64,
    #[serde(rename = "isLarge")]
    pub is_large: f64,
    #[serde(rename = "isSmall")]
    pub is_small: f64,
    #[serde(rename = "isMedium")]
    pub is_medium: f64,
}

impl AmountFeatureWeights {
    /// Weights for a category known only from curated vocabulary
    pub const COVERAGE_DEFAULT: AmountFeatureWeights = AmountFeatureWeights {
        amount: 0.1,
        is_large: 0.2,
        is_small: 0.6,
        is_medium: 0.4,
    };

    /// Derive weights from the mean absolute amount of a category
    pub fn from_mean_amount(avg_amount: f64) -> Self {
        let scale = (avg_amount / 100_000.0).clamp(0.1, 0.7);
        Self {
            amount: round_to(scale, 3),
            is_large: if avg_amount > 10_000.0 { 0.6 } else { 0.2 },
            is_small: if avg_amount < 1_000.0 { 0.6 } else { 0.2 },
            is_medium: 0.4,
        }
    }
}

/// The models a training run can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TransactionCategorizer,
    SpendingForecaster,
    BudgetAllocator,
    GoalPredictor,
    AnomalyDetector,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TransactionCategorizer => "transaction_categorizer",
            ModelKind::SpendingForecaster => "spending_forecaster",
            ModelKind::BudgetAllocator => "budget_allocator",
            ModelKind::GoalPredictor => "goal_predictor",
            ModelKind::AnomalyDetector => "anomaly_detector",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            ModelKind::TransactionCategorizer,
            ModelKind::SpendingForecaster,
            ModelKind::BudgetAllocator,
            ModelKind::GoalPredictor,
            ModelKind::AnomalyDetector,
        ]
    }

    /// Whether this model is trained from the labeled transaction dataset
    pub fn uses_transactions(&self) -> bool {
        matches!(
            self,
            ModelKind::TransactionCategorizer | ModelKind::AnomalyDetector
        )
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "transaction_categorizer" => Ok(ModelKind::TransactionCategorizer),
            "spending_forecaster" => Ok(ModelKind::SpendingForecaster),
            "budget_allocator" => Ok(ModelKind::BudgetAllocator),
            "goal_predictor" => Ok(ModelKind::GoalPredictor),
            "anomaly_detector" => Ok(ModelKind::AnomalyDetector),
            _ => Err(format!("Unknown model: {}", s)),
        }
    }
}

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Ratio that resolves a zero denominator to 0
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
