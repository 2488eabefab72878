use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};
use tracing::trace;

/// Raw running sums of an [`ObservableAccumulator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    /// Number of recorded samples. Fractional after averaging across workers.
    pub count: f64,
    /// Sum of energies.
    pub energy: f64,
    /// Sum of squared energies.
    pub energy_sq: f64,
    /// Per-species sums of singlets.
    pub singlets: Vec<f64>,
    /// Per-species sums of squared singlets.
    pub singlets_sq: Vec<f64>,
}

/// On-line energy and singlet statistics.
///
/// Variances are `E[x^2] - E[x]^2` clamped at zero; round-off can otherwise
/// push a flat signal slightly negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableAccumulator {
    sums: AccumulatorSnapshot,
    correlation_time: Option<f64>,
}

impl ObservableAccumulator {
    /// Creates an empty accumulator tracking `num_singlets` species.
    pub fn new(num_singlets: usize) -> Self {
        Self {
            sums: AccumulatorSnapshot {
                count: 0.0,
                energy: 0.0,
                energy_sq: 0.0,
                singlets: vec![0.0; num_singlets],
                singlets_sq: vec![0.0; num_singlets],
            },
            correlation_time: None,
        }
    }

    /// Rebuilds an accumulator from raw sums.
    pub fn from_snapshot(snapshot: AccumulatorSnapshot) -> Result<Self, SgcError> {
        if snapshot.singlets.len() != snapshot.singlets_sq.len() {
            return Err(SgcError::Configuration(
                ErrorInfo::new("snapshot-shape", "singlet sums have mismatched lengths")
                    .with_context("singlets", snapshot.singlets.len().to_string())
                    .with_context("singlets_sq", snapshot.singlets_sq.len().to_string()),
            ));
        }
        Ok(Self {
            sums: snapshot,
            correlation_time: None,
        })
    }

    /// Records one sample. O(number of species).
    pub fn record(&mut self, energy: f64, singlets: &[f64]) -> Result<(), SgcError> {
        if singlets.len() != self.sums.singlets.len() {
            return Err(SgcError::Configuration(
                ErrorInfo::new("singlet-length", "sample has the wrong number of singlets")
                    .with_context("expected", self.sums.singlets.len().to_string())
                    .with_context("actual", singlets.len().to_string()),
            ));
        }
        let sums = &mut self.sums;
        sums.count += 1.0;
        sums.energy += energy;
        sums.energy_sq += energy * energy;
        for ((sum, sum_sq), &value) in sums
            .singlets
            .iter_mut()
            .zip(sums.singlets_sq.iter_mut())
            .zip(singlets)
        {
            *sum += value;
            *sum_sq += value * value;
        }
        Ok(())
    }

    /// Zeroes every sum. The correlation time is kept.
    pub fn reset(&mut self) {
        let n = self.sums.singlets.len();
        self.sums = AccumulatorSnapshot {
            count: 0.0,
            energy: 0.0,
            energy_sq: 0.0,
            singlets: vec![0.0; n],
            singlets_sq: vec![0.0; n],
        };
    }

    /// Sets (or clears) the integrated correlation time in samples.
    pub fn set_correlation_time(&mut self, tau: Option<f64>) {
        self.correlation_time = tau.filter(|t| t.is_finite() && *t > 0.0);
    }

    /// Integrated correlation time, if known.
    pub fn correlation_time(&self) -> Option<f64> {
        self.correlation_time
    }

    /// Number of samples.
    pub fn count(&self) -> f64 {
        self.sums.count
    }

    /// Number of tracked singlets.
    pub fn num_singlets(&self) -> usize {
        self.sums.singlets.len()
    }

    /// Raw sums.
    pub fn snapshot(&self) -> AccumulatorSnapshot {
        self.sums.clone()
    }

    /// Mean energy; zero when empty.
    pub fn mean_energy(&self) -> f64 {
        if self.sums.count <= 0.0 {
            return 0.0;
        }
        self.sums.energy / self.sums.count
    }

    /// Per-sample energy variance.
    pub fn variance_energy(&self) -> f64 {
        if self.sums.count <= 0.0 {
            return 0.0;
        }
        let mean = self.mean_energy();
        clamp_variance(self.sums.energy_sq / self.sums.count - mean * mean)
    }

    /// Mean singlets; zeros when empty.
    pub fn mean_singlets(&self) -> Vec<f64> {
        let n = self.sums.count;
        self.sums
            .singlets
            .iter()
            .map(|&s| if n > 0.0 { s / n } else { 0.0 })
            .collect()
    }

    /// Per-sample singlet variances.
    pub fn variance_singlets(&self) -> Vec<f64> {
        let n = self.sums.count;
        if n <= 0.0 {
            return vec![0.0; self.sums.singlets.len()];
        }
        self.sums
            .singlets
            .iter()
            .zip(self.sums.singlets_sq.iter())
            .map(|(&s, &sq)| {
                let mean = s / n;
                clamp_variance(sq / n - mean * mean)
            })
            .collect()
    }

    /// Variance of the mean energy, `var/N` or `2 tau var / N`.
    pub fn variance_of_mean_energy(&self) -> f64 {
        self.of_mean(self.variance_energy())
    }

    /// Variance of the mean singlets.
    pub fn variance_of_mean_singlets(&self) -> Vec<f64> {
        self.variance_singlets()
            .into_iter()
            .map(|v| self.of_mean(v))
            .collect()
    }

    fn of_mean(&self, variance: f64) -> f64 {
        if self.sums.count <= 0.0 {
            return 0.0;
        }
        match self.correlation_time {
            Some(tau) => 2.0 * tau * variance / self.sums.count,
            None => variance / self.sums.count,
        }
    }
}

fn clamp_variance(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    if value < 0.0 {
        trace!(value, "negative variance clamped");
        return 0.0;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_signal_has_zero_variance() {
        let mut acc = ObservableAccumulator::new(1);
        for _ in 0..1000 {
            acc.record(0.1 + 0.2, &[1.0 / 3.0]).unwrap();
        }
        let var = acc.variance_energy();
        assert!((0.0..1e-12).contains(&var));
        assert!(acc.variance_singlets()[0] >= 0.0);
    }

    #[test]
    fn correlation_time_inflates_variance_of_mean() {
        let mut acc = ObservableAccumulator::new(0);
        for i in 0..10 {
            acc.record(i as f64, &[]).unwrap();
        }
        let plain = acc.variance_of_mean_energy();
        acc.set_correlation_time(Some(3.0));
        assert!((acc.variance_of_mean_energy() - 6.0 * plain).abs() < 1e-12);
        acc.set_correlation_time(Some(-1.0));
        assert_eq!(acc.correlation_time(), None);
    }
}
