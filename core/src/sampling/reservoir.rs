//! Weighted reservoir sampling

use crate::pbrt::*;

/// Single-slot weighted reservoir. Each candidate replaces the current
/// selection with probability `weight / total_weight`.
#[derive(Clone, Debug, Default)]
pub struct Reservoir<T> {
    /// Selected candidate.
    pub sample: Option<T>,

    /// Sum of candidate weights seen so far.
    pub total_weight: Float,

    /// Number of candidates seen so far.
    pub count: u32,
}

impl<T> Reservoir<T> {
    /// Returns an empty reservoir.
    pub fn new() -> Self {
        Self {
            sample: None,
            total_weight: 0.0,
            count: 0,
        }
    }

    /// Offers a candidate. Returns `true` if it was selected.
    ///
    /// * `sample` - The candidate.
    /// * `weight` - Its non-negative weight.
    /// * `u`      - Uniform random number in [0, 1).
    pub fn update(&mut self, sample: T, weight: Float, u: Float) -> bool {
        self.count += 1;
        if !(weight > 0.0) {
            return false;
        }
        self.total_weight += weight;
        if u * self.total_weight < weight {
            self.sample = Some(sample);
            true
        } else {
            false
        }
    }

    /// Returns the selection probability of the current sample given its
    /// weight.
    ///
    /// * `weight` - Weight of the selected candidate.
    pub fn probability(&self, weight: Float) -> Float {
        if self.total_weight > 0.0 {
            weight / self.total_weight
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RNG;

    #[test]
    fn first_positive_candidate_always_taken() {
        let mut r = Reservoir::new();
        assert!(r.update(1, 0.5, 0.99));
        assert_eq!(r.sample, Some(1));
    }

    #[test]
    fn zero_weight_is_counted_but_ignored() {
        let mut r = Reservoir::new();
        r.update(1, 0.0, 0.0);
        assert_eq!(r.count, 1);
        assert!(r.sample.is_none());
    }

    #[test]
    fn selection_frequency_follows_weight() {
        let mut rng = RNG::new(3);
        let mut hits = 0;
        let n = 20000;
        for _ in 0..n {
            let mut r = Reservoir::new();
            r.update(0, 1.0, rng.uniform_float());
            r.update(1, 3.0, rng.uniform_float());
            if r.sample == Some(1) {
                hits += 1;
            }
        }
        let f = hits as Float / n as Float;
        assert!((f - 0.75).abs() < 0.02);
    }
}
