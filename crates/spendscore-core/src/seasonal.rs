//! Seasonal profile builder
//!
//! Per category: a multiplicative index for each calendar month seen
//! (month mean over the mean of month means) and a baseline monthly average
//! (mean single amount × 30).

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{round_to, Observation};
use crate::robust::mean;

/// Daily-rate to monthly-scale factor applied to the mean amount
const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    /// Calendar month (1-12) -> seasonal factor; empty when there is no signal
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub monthly_index: BTreeMap<u32, f64>,
    pub baseline_average: f64,
}

impl SeasonalProfile {
    /// Index for `month`, 1.0 when the month was never observed
    pub fn index(&self, month: u32) -> f64 {
        self.monthly_index.get(&month).copied().unwrap_or(1.0)
    }

    /// Predicted spend for a calendar month
    pub fn forecast(&self, month: u32) -> f64 {
        self.baseline_average * self.index(month)
    }

    pub fn rounded(&self) -> Self {
        Self {
            monthly_index: self
                .monthly_index
                .iter()
                .map(|(month, index)| (*month, round_to(*index, 3)))
                .collect(),
            baseline_average: round_to(self.baseline_average, 2),
        }
    }
}

pub type SeasonalProfileTable = BTreeMap<String, SeasonalProfile>;

/// Unrounded profiles for every category present
pub fn build_seasonal_profiles<O: Observation>(observations: &[O]) -> SeasonalProfileTable {
    let mut by_category: BTreeMap<&str, BTreeMap<u32, Vec<f64>>> = BTreeMap::new();
    for obs in observations {
        by_category
            .entry(obs.category())
            .or_default()
            .entry(obs.date().month())
            .or_default()
            .push(obs.amount().abs());
    }

    by_category
        .into_iter()
        .map(|(category, months)| {
            let month_means: BTreeMap<u32, f64> = months
                .iter()
                .filter_map(|(month, amounts)| mean(amounts).map(|m| (*month, m)))
                .collect();
            let overall = mean(&month_means.values().copied().collect::<Vec<_>>()).unwrap_or(0.0);

            let monthly_index = if overall > 0.0 {
                month_means
                    .into_iter()
                    .map(|(month, m)| (month, m / overall))
                    .collect()
            } else {
                BTreeMap::new()
            };

            let all_amounts: Vec<f64> = months.into_values().flatten().collect();
            let baseline_average = mean(&all_amounts).unwrap_or(0.0) * DAYS_PER_MONTH;

            (
                category.to_string(),
                SeasonalProfile {
                    monthly_index,
                    baseline_average,
                },
            )
        })
        .collect()
}

/// Train the exported spending forecaster (index to 3 decimals, average to 2)
pub fn train_spending_forecaster<O: Observation>(observations: &[O]) -> SeasonalProfileTable {
    let table: SeasonalProfileTable = build_seasonal_profiles(observations)
        .into_iter()
        .map(|(category, profile)| (category, profile.rounded()))
        .collect();
    info!(categories = table.len(), "Trained spending forecaster");
    table
}
