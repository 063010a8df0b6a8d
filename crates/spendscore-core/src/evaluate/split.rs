//! Train/test splitting

use crate::models::Observation;
use crate::sampling::SeededRng;

/// Number of rows that go to training: `floor(n * (1 - test_frac))`
pub fn train_cutoff(n: usize, test_frac: f64) -> usize {
    let cutoff = (n as f64 * (1.0 - test_frac)).floor();
    (cutoff.max(0.0) as usize).min(n)
}

/// Sort ascending by date (stable) and cut; the test split is the most recent rows
pub fn time_split<T: Observation + Clone>(rows: &[T], test_frac: f64) -> (Vec<T>, Vec<T>) {
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|row| row.date());
    let test = sorted.split_off(train_cutoff(sorted.len(), test_frac));
    (sorted, test)
}

/// Seeded shuffle, then cut at the same fraction as [`time_split`]
pub fn random_split<T: Clone>(rows: &[T], test_frac: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    SeededRng::new(seed).shuffle(&mut order);
    let cutoff = train_cutoff(rows.len(), test_frac);

    let train = order[..cutoff].iter().map(|&i| rows[i].clone()).collect();
    let test = order[cutoff..].iter().map(|&i| rows[i].clone()).collect();
    (train, test)
}
