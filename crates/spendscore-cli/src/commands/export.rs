//! Export-clean command implementation

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use spendscore_core::{BudgetShareRow, GoalRecord, ModelKind, SpendingRecord, Transaction};

use super::datasets::{load_config, load_inputs, parse_selection};
use crate::cli::DatasetArgs;

pub fn write_transactions_csv(path: &Path, rows: &[Transaction]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_spending_csv(path: &Path, rows: &[SpendingRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One column per category seen in any row; absent shares are left blank
pub fn write_budget_shares_csv(path: &Path, rows: &[BudgetShareRow]) -> Result<()> {
    let columns: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|&column| row.get(column).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_goals_csv(path: &Path, rows: &[GoalRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn cmd_export_clean(
    config_path: Option<&Path>,
    model: &str,
    data: &DatasetArgs,
    output: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let selection = parse_selection(model)?;
    let inputs = load_inputs(data, selection, &config)?;

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    println!("📤 Exporting cleaned datasets to {}...", output.display());

    let wants = |kind: ModelKind| selection.includes(kind);

    if (wants(ModelKind::TransactionCategorizer) || wants(ModelKind::AnomalyDetector))
        && !inputs.transactions.is_empty()
    {
        let path = output.join("transactions_clean.csv");
        write_transactions_csv(&path, &inputs.transactions)?;
        println!("   {} ({} rows)", path.display(), inputs.transactions.len());
    }
    if wants(ModelKind::SpendingForecaster) && !inputs.spending.is_empty() {
        let path = output.join("spending_clean.csv");
        write_spending_csv(&path, &inputs.spending)?;
        println!("   {} ({} rows)", path.display(), inputs.spending.len());
    }
    if wants(ModelKind::BudgetAllocator) && !inputs.budget_rows.is_empty() {
        let path = output.join("budget_shares_clean.csv");
        write_budget_shares_csv(&path, &inputs.budget_rows)?;
        println!("   {} ({} rows)", path.display(), inputs.budget_rows.len());
    }
    if wants(ModelKind::GoalPredictor) && !inputs.goals.is_empty() {
        let path = output.join("goal_savings_clean.csv");
        write_goals_csv(&path, &inputs.goals)?;
        println!("   {} ({} rows)", path.display(), inputs.goals.len());
    }

    println!("✅ Export complete!");
    Ok(())
}
