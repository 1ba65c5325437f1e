//! Statistical baseline over complete historical buckets.

/// Sample statistics over the historical lookback, computed fresh for every
/// evaluation. Never cached across cycles: the baseline must always reflect
/// the latest closed buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub stddev: f64,
    pub samples: usize,
}

impl Baseline {
    /// Build a baseline from historical bucket counts.
    ///
    /// Returns `None` unless exactly `expected_points` counts are present —
    /// a project that is too new, or has gaps in its history, must never
    /// produce a baseline (a false baseline means false positives). The
    /// caller guarantees `expected_points >= 2` via config validation, but
    /// the guard here keeps the n-1 denominator safe regardless.
    pub fn from_counts(counts: &[u64], expected_points: usize) -> Option<Self> {
        if counts.len() != expected_points || counts.len() < 2 {
            return None;
        }

        let n = counts.len() as f64;
        let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
        let sum_sq = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>();
        // Sample standard deviation, Bessel's correction.
        let stddev = (sum_sq / (n - 1.0)).sqrt();

        Some(Self {
            mean,
            stddev,
            samples: counts.len(),
        })
    }

    /// Upper bound of "normal" rate per minute: two standard deviations
    /// above the mean count per window, scaled by the window length.
    pub fn expected_rate(&self, window_minutes: u64) -> f64 {
        (self.mean + 2.0 * self.stddev) / window_minutes.max(1) as f64
    }
}
