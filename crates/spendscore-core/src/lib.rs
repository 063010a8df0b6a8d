//! Spendscore Core Library
//!
//! Builds and evaluates the scoring models behind a personal finance
//! assistant:
//! - Tokenizer and TF-IDF token weighting over transaction descriptions
//! - Category scoring model (keywords, token weights, amount features, priors)
//! - Robust per-category statistics for anomaly thresholds
//! - Monthly seasonal profiles for spending forecasts
//! - Budget share and savings-goal tables
//! - Dataset cleaning and CSV import
//! - Evaluation harness with time-ordered and seeded random splits

pub mod budget;
pub mod categorizer;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod import;
pub mod models;
pub mod robust;
pub mod sampling;
pub mod seasonal;
pub mod tokenize;
pub mod training;
pub mod weights;

pub use budget::{income_bracket, BudgetShareTable, SavingsRateTable};
pub use categorizer::{build_scoring_tables, CategorizerArtifact, CategoryScorer};
pub use config::{ConfigSource, DatasetFilters, ScoringConfig, TrainingParams, Vocabulary};
pub use error::{Error, Result};
pub use evaluate::{
    AllocatorMetrics, AnomalyMetrics, ClassificationMetrics, ForecastMetrics, GoalMetrics,
    ModelMetrics,
};
pub use import::{HabitsData, ParsedRows, SpendingColumns, TransactionColumns};
pub use models::{
    BudgetShareRow, GoalRecord, ModelKind, Observation, SpendingRecord, Transaction,
    TransactionType, FALLBACK_CATEGORY,
};
pub use robust::{CategoryRobustStats, RobustStatsTable};
pub use seasonal::{SeasonalProfile, SeasonalProfileTable};
pub use tokenize::Tokenizer;
pub use training::{
    run_training, DatasetCounts, ModelSelection, TrainingArtifacts, TrainingInputs,
    TrainingReport, TrainingRun,
};
pub use weights::TokenWeighter;
