//! Robust statistics for anomaly thresholds
//!
//! Median, median absolute deviation and linearly interpolated percentiles of
//! absolute amounts, per category. Categories below the sample floor get no
//! entry at all; callers must read a missing entry as "cannot evaluate".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ScoringConfig;
use crate::models::{round_to, Observation};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_copy(values);
    median_sorted(&sorted)
}

/// Median absolute deviation around the median
pub fn mad(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Percentile `p` in `[0, 100]` with linear interpolation between closest ranks
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let sorted = sorted_copy(values);
    percentile_sorted(&sorted, p)
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn median_sorted(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        return Some((sorted[middle - 1] + sorted[middle]) / 2.0);
    }
    Some(sorted[middle])
}

fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Robust profile of one category's absolute amounts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryRobustStats {
    pub median: f64,
    pub mad: f64,
    pub p90: f64,
    pub p95: f64,
    pub p97: f64,
    pub p98: f64,
    pub p99: f64,
    pub p995: f64,
    pub count: usize,
}

impl CategoryRobustStats {
    /// Compute the profile, `None` when there are no samples
    pub fn from_amounts(amounts: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(amounts);
        let median = median_sorted(&sorted)?;
        let at = |p: f64| percentile_sorted(&sorted, p).unwrap_or(median);
        Some(Self {
            median,
            mad: mad(&sorted).unwrap_or(0.0),
            p90: at(90.0),
            p95: at(95.0),
            p97: at(97.0),
            p98: at(98.0),
            p99: at(99.0),
            p995: at(99.5),
            count: sorted.len(),
        })
    }

    /// Copy with every statistic rounded to 4 decimals, as exported
    pub fn rounded(&self) -> Self {
        Self {
            median: round_to(self.median, 4),
            mad: round_to(self.mad, 4),
            p90: round_to(self.p90, 4),
            p95: round_to(self.p95, 4),
            p97: round_to(self.p97, 4),
            p98: round_to(self.p98, 4),
            p99: round_to(self.p99, 4),
            p995: round_to(self.p995, 4),
            count: self.count,
        }
    }
}

pub type RobustStatsTable = BTreeMap<String, CategoryRobustStats>;

/// Absolute amounts grouped by category, in input order
pub fn amounts_by_category<O: Observation>(observations: &[O]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for obs in observations {
        let amount = obs.amount();
        if amount.is_nan() {
            continue;
        }
        groups
            .entry(obs.category().to_string())
            .or_default()
            .push(amount.abs());
    }
    groups
}

/// Unrounded stats for every category with at least `min_samples` rows
pub fn build_robust_stats<O: Observation>(observations: &[O], min_samples: usize) -> RobustStatsTable {
    let mut table = RobustStatsTable::new();
    for (category, amounts) in amounts_by_category(observations) {
        if amounts.len() < min_samples {
            debug!(category = %category, samples = amounts.len(), "Too few samples for robust stats");
            continue;
        }
        if let Some(stats) = CategoryRobustStats::from_amounts(&amounts) {
            table.insert(category, stats);
        }
    }
    table
}

/// Train the exported anomaly detector (rounded stats)
pub fn train_anomaly_detector<O: Observation>(
    observations: &[O],
    config: &ScoringConfig,
) -> RobustStatsTable {
    let table: RobustStatsTable = build_robust_stats(observations, config.training.robust_min_samples)
        .into_iter()
        .map(|(category, stats)| (category, stats.rounded()))
        .collect();
    info!(categories = table.len(), "Trained anomaly detector");
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpendingRecord;
    use chrono::NaiveDate;

    fn record(category: &str, amount: f64) -> SpendingRecord {
        SpendingRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category: category.to_string(),
            amount,
        }
    }

    #[test]
    fn test_median_odd_even_empty() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mad() {
        // deviations from 3: 2, 1, 0, 1, 97 -> median 1
        assert_eq!(mad(&[1.0, 2.0, 3.0, 4.0, 100.0]), Some(1.0));
        assert_eq!(mad(&[5.0, 5.0, 5.0]), Some(0.0));
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        // rank 0.9 * 4 = 3.6
        let p90 = percentile(&values, 90.0).unwrap();
        assert!((p90 - 4.6).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 99.5), Some(7.0));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_stats_are_ordered() {
        let amounts: Vec<f64> = (1..=50).map(|i| (i * i) as f64 * 1.7).collect();
        let stats = CategoryRobustStats::from_amounts(&amounts).unwrap();
        assert!(stats.median <= stats.p90);
        assert!(stats.p90 <= stats.p95);
        assert!(stats.p95 <= stats.p97);
        assert!(stats.p97 <= stats.p98);
        assert!(stats.p98 <= stats.p99);
        assert!(stats.p99 <= stats.p995);
        assert_eq!(stats.count, 50);
    }

    #[test]
    fn test_categories_below_floor_are_omitted() {
        let mut rows: Vec<SpendingRecord> = (0..5).map(|i| record("Food", -(i as f64) - 10.0)).collect();
        rows.extend((0..4).map(|_| record("Travel", 300.0)));

        let table = build_robust_stats(&rows, 5);
        assert!(table.contains_key("Food"));
        assert!(!table.contains_key("Travel"));
        assert_eq!(table["Food"].median, 12.0);
    }

    #[test]
    fn test_train_anomaly_detector_rounds() {
        let config = ScoringConfig::default();
        let rows: Vec<SpendingRecord> = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .map(|v| record("Coffee", v / 3.0))
            .collect();

        let table = train_anomaly_detector(&rows, &config);
        let coffee = table["Coffee"];
        assert_eq!(coffee.median, 1.1667);
        assert_eq!(coffee.count, 6);
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<SpendingRecord> = Vec::new();
        assert!(build_robust_stats(&rows, 5).is_empty());
        assert!(CategoryRobustStats::from_amounts(&[]).is_none());
    }
}
