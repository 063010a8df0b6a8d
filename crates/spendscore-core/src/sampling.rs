//! Seeded sampling
//!
//! A fixed 64-bit LCG so shuffles and down-sampling are bit-identical across
//! runs, platforms and dependency upgrades.

/// Deterministic pseudo-random source
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        // Knuth MMIX multiplier, increment 1
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1);
        self.state
    }

    /// Uniform index in `0..bound` (`bound` must be non-zero)
    pub fn next_below(&mut self, bound: usize) -> usize {
        // High bits of an LCG are the well-mixed ones
        ((self.next_u64() >> 11) % bound as u64) as usize
    }

    /// In-place Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_below(i + 1);
            items.swap(i, j);
        }
    }

    /// `k` distinct indices out of `0..n`, in draw order
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        self.shuffle(&mut indices);
        indices.truncate(k.min(n));
        indices
    }
}
