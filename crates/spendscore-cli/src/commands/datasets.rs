//! Shared utilities: config loading, model selection and dataset loading

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use spendscore_core::{
    import::{
        parse_budget_allocation_csv, parse_spending_csv, parse_spending_habits_csv,
        parse_transactions_csv, HabitsData, SpendingColumns, TransactionColumns,
    },
    ModelKind, ModelSelection, ScoringConfig, TrainingInputs,
};
use tracing::warn;

use crate::cli::DatasetArgs;

/// Load the scoring config; an explicit path must exist
pub fn load_config(path: Option<&Path>) -> Result<ScoringConfig> {
    if let Some(path) = path {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
    }
    ScoringConfig::load(path).context("Failed to load scoring config")
}

pub fn parse_selection(model: &str) -> Result<ModelSelection> {
    model.parse().map_err(|e: String| {
        anyhow::anyhow!(
            "{}\nUse one of: transaction_categorizer, spending_forecaster, \
             budget_allocator, goal_predictor, anomaly_detector, all",
            e
        )
    })
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))
}

/// A dataset a selected model needs but was not given is an error for a
/// single model; a full run trains that model on an empty dataset.
fn check_provided(provided: bool, flag: &str, kind: ModelKind, selection: ModelSelection) -> Result<()> {
    if provided {
        return Ok(());
    }
    match selection {
        ModelSelection::All => {
            warn!(model = %kind, "No --{} given; training on an empty dataset", flag);
            Ok(())
        }
        ModelSelection::One(_) => bail!("{} needs --{}", kind, flag),
    }
}

/// Read, parse and clean every dataset the selected models use
pub fn load_inputs(
    data: &DatasetArgs,
    selection: ModelSelection,
    config: &ScoringConfig,
) -> Result<TrainingInputs> {
    let mut transactions = Vec::new();
    let mut spending = Vec::new();
    let mut budget_rows = Vec::new();
    let mut goals = Vec::new();

    for kind in [ModelKind::TransactionCategorizer, ModelKind::AnomalyDetector] {
        if selection.includes(kind) {
            check_provided(data.transactions.is_some(), "transactions", kind, selection)?;
        }
    }
    if selection.includes(ModelKind::TransactionCategorizer)
        || selection.includes(ModelKind::AnomalyDetector)
    {
        if let Some(path) = &data.transactions {
            let parsed = parse_transactions_csv(open(path)?, &TransactionColumns::default())
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            println!(
                "📥 {}: {} transactions ({} rejected)",
                path.display(),
                parsed.rows.len(),
                parsed.rejected
            );
            transactions = parsed.rows;
        }
    }

    if selection.includes(ModelKind::SpendingForecaster) {
        check_provided(
            data.spending.is_some(),
            "spending",
            ModelKind::SpendingForecaster,
            selection,
        )?;
        if let Some(path) = &data.spending {
            let columns = SpendingColumns {
                date: data.spending_date_column.clone(),
                category: data.spending_category_column.clone(),
                amount: data.spending_amount_column.clone(),
            };
            let parsed = parse_spending_csv(open(path)?, &columns)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            println!(
                "📥 {}: {} spending rows ({} rejected)",
                path.display(),
                parsed.rows.len(),
                parsed.rejected
            );
            spending = parsed.rows;
        }
    }

    let wants_budget = selection.includes(ModelKind::BudgetAllocator);
    let wants_goals = selection.includes(ModelKind::GoalPredictor);

    if wants_budget {
        check_provided(
            !data.budget.is_empty() || data.habits.is_some(),
            "budget",
            ModelKind::BudgetAllocator,
            selection,
        )?;
        for path in &data.budget {
            let rows = parse_budget_allocation_csv(open(path)?, &config.vocabulary)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            println!("📥 {}: {} budget rows", path.display(), rows.len());
            budget_rows.extend(rows);
        }
    }
    if wants_goals {
        check_provided(
            data.habits.is_some(),
            "habits",
            ModelKind::GoalPredictor,
            selection,
        )?;
    }
    if wants_budget || wants_goals {
        if let Some(path) = &data.habits {
            let HabitsData { shares, goals: parsed_goals } =
                parse_spending_habits_csv(open(path)?, &config.vocabulary)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
            println!(
                "📥 {}: {} share rows, {} goal records",
                path.display(),
                shares.len(),
                parsed_goals.len()
            );
            if wants_budget {
                budget_rows.extend(shares);
            }
            if wants_goals {
                goals = parsed_goals;
            }
        }
    }

    Ok(TrainingInputs::from_raw(
        transactions,
        spending,
        budget_rows,
        goals,
        config,
    ))
}
