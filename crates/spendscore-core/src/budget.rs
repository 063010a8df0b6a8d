//! Budget allocator and savings goal predictor

use std::collections::BTreeMap;

use tracing::info;

use crate::models::{round_to, BudgetShareRow, GoalRecord};
use crate::robust::mean;

/// category -> average share of the total budget
pub type BudgetShareTable = BTreeMap<String, f64>;

/// income bracket -> savings rate (0..=1)
pub type SavingsRateTable = BTreeMap<String, f64>;

/// Bracket upper bounds (inclusive) and labels; the first bracket also
/// includes its lower bound of 0
const INCOME_BRACKETS: [(f64, &str); 6] = [
    (20_000.0, "<20k"),
    (50_000.0, "20-50k"),
    (100_000.0, "50-100k"),
    (200_000.0, "100-200k"),
    (500_000.0, "200-500k"),
    (1_000_000_000.0, "500k+"),
];

/// Map an income onto its bracket label, `None` outside `[0, 1e9]`
pub fn income_bracket(income: f64) -> Option<&'static str> {
    if income.is_nan() || income < 0.0 {
        return None;
    }
    INCOME_BRACKETS
        .iter()
        .find(|(upper, _)| income <= *upper)
        .map(|(_, label)| *label)
}

/// Mean share per category over the rows that mention it, rounded to 4 decimals
pub fn train_budget_allocator(rows: &[BudgetShareRow]) -> BudgetShareTable {
    let mut shares: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        for (category, share) in row {
            shares.entry(category.as_str()).or_default().push(*share);
        }
    }

    let table: BudgetShareTable = shares
        .into_iter()
        .filter_map(|(category, values)| {
            mean(&values).map(|m| (category.to_string(), round_to(m, 4)))
        })
        .collect();
    info!(
        rows = rows.len(),
        categories = table.len(),
        "Trained budget allocator"
    );
    table
}

/// Unrounded mean savings rate per bracket; records outside every bracket are ignored
pub fn savings_rates(records: &[GoalRecord]) -> BTreeMap<&'static str, f64> {
    let mut by_bracket: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(bracket) = income_bracket(record.income) {
            by_bracket
                .entry(bracket)
                .or_default()
                .push(record.desired_savings_percentage);
        }
    }

    by_bracket
        .into_iter()
        .filter_map(|(bracket, pcts)| mean(&pcts).map(|m| (bracket, m / 100.0)))
        .collect()
}

/// Savings rate per income bracket, rounded to 4 decimals
pub fn train_goal_predictor(records: &[GoalRecord]) -> SavingsRateTable {
    let table: SavingsRateTable = savings_rates(records)
        .into_iter()
        .map(|(bracket, rate)| (bracket.to_string(), round_to(rate, 4)))
        .collect();
    info!(brackets = table.len(), "Trained goal predictor");
    table
}
