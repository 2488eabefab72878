use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};
use tracing::debug;

use crate::observables::ObservableAccumulator;

/// State of a [`ConvergenceChecker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceStatus {
    /// More windows are needed.
    Sampling,
    /// Two consecutive windows agreed within the confidence band.
    Converged,
    /// The window budget ran out first.
    MaxIterReached,
}

/// Means and variances of the mean captured at the end of one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Mean energy over the window.
    pub mean_energy: f64,
    /// Variance of the mean energy.
    pub var_mean_energy: f64,
    /// Mean singlets over the window.
    pub singlets: Vec<f64>,
    /// Variance of the mean singlets.
    pub var_mean_singlets: Vec<f64>,
}

impl WindowStats {
    /// Snapshot of `acc` with variances divided by the number of aggregated workers.
    pub fn from_accumulator(acc: &ObservableAccumulator, workers: usize) -> Self {
        let workers = workers.max(1) as f64;
        Self {
            mean_energy: acc.mean_energy(),
            var_mean_energy: acc.variance_of_mean_energy() / workers,
            singlets: acc.mean_singlets(),
            var_mean_singlets: acc
                .variance_of_mean_singlets()
                .into_iter()
                .map(|v| v / workers)
                .collect(),
        }
    }
}

/// Outcome of comparing two windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowComparison {
    /// The windows track a different number of singlets.
    Incomparable,
    /// Every combined variance is zero.
    Frozen,
    /// Largest z-statistic over the quantities with positive variance.
    Z(f64),
}

/// Compares two windows quantity by quantity.
pub fn compare_windows(previous: &WindowStats, current: &WindowStats) -> WindowComparison {
    if previous.singlets.len() != current.singlets.len()
        || current.singlets.len() != current.var_mean_singlets.len()
        || previous.singlets.len() != previous.var_mean_singlets.len()
    {
        return WindowComparison::Incomparable;
    }
    let energy = std::iter::once((
        current.mean_energy - previous.mean_energy,
        current.var_mean_energy + previous.var_mean_energy,
    ));
    let singlets = current
        .singlets
        .iter()
        .zip(&previous.singlets)
        .zip(current.var_mean_singlets.iter().zip(&previous.var_mean_singlets))
        .map(|((cur, prev), (var_cur, var_prev))| (cur - prev, var_cur + var_prev));
    let mut largest: Option<f64> = None;
    for (diff, var) in energy.chain(singlets) {
        if var > 0.0 {
            let z = z_statistic(diff, var);
            largest = Some(largest.map_or(z, |best| best.max(z)));
        }
    }
    match largest {
        Some(z) => WindowComparison::Z(z),
        None => WindowComparison::Frozen,
    }
}

/// `|diff| / sqrt(var)`.
pub fn z_statistic(diff: f64, combined_variance: f64) -> f64 {
    diff.abs() / combined_variance.sqrt()
}

/// Returns true when `ppf(alpha) < z < ppf(1 - alpha)`.
pub fn within_confidence(z: f64, confidence_level: f64) -> bool {
    normal_quantile(confidence_level) < z && z < normal_quantile(1.0 - confidence_level)
}

/// Windowed equilibration test.
///
/// Each call to [`ConvergenceChecker::check`] consumes one window. The first
/// window only primes the comparison; later windows converge once they agree
/// with their predecessor.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    confidence_level: f64,
    max_iterations: usize,
    iterations: usize,
    previous: Option<WindowStats>,
    status: ConvergenceStatus,
    last_z: Option<f64>,
}

impl ConvergenceChecker {
    /// Creates a checker. `confidence_level` must lie in `(0, 0.5)`.
    pub fn new(confidence_level: f64, max_iterations: usize) -> Result<Self, SgcError> {
        if !(confidence_level > 0.0 && confidence_level < 0.5) {
            return Err(SgcError::Configuration(
                ErrorInfo::new("confidence-level", "confidence level must lie in (0, 0.5)")
                    .with_context("value", confidence_level.to_string()),
            ));
        }
        let status = if max_iterations == 0 {
            ConvergenceStatus::MaxIterReached
        } else {
            ConvergenceStatus::Sampling
        };
        Ok(Self {
            confidence_level,
            max_iterations,
            iterations: 0,
            previous: None,
            status,
            last_z: None,
        })
    }

    /// Current state.
    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    /// Windows consumed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// z-statistic of the most recent comparable window.
    pub fn last_z(&self) -> Option<f64> {
        self.last_z
    }

    /// Feeds one window and advances the state machine.
    ///
    /// Terminal states are sticky.
    pub fn check(&mut self, window: WindowStats) -> ConvergenceStatus {
        if self.status != ConvergenceStatus::Sampling {
            return self.status;
        }
        self.iterations += 1;
        let converged = match self.previous.as_ref().map(|prev| compare_windows(prev, &window)) {
            None | Some(WindowComparison::Incomparable) => false,
            Some(WindowComparison::Frozen) => {
                self.last_z = Some(0.0);
                true
            }
            Some(WindowComparison::Z(z)) => {
                self.last_z = Some(z);
                within_confidence(z, self.confidence_level)
            }
        };
        debug!(iteration = self.iterations, z = ?self.last_z, converged, "equilibration window");
        self.previous = Some(window);
        self.status = if converged {
            ConvergenceStatus::Converged
        } else if self.iterations >= self.max_iterations {
            ConvergenceStatus::MaxIterReached
        } else {
            ConvergenceStatus::Sampling
        };
        self.status
    }
}

/// Precision-mode stopping rule.
///
/// True once the variance of the mean of every singlet and of the per-site
/// energy is below `(precision / ppf(1 - alpha))^2`. Variances are divided by
/// `workers`. At least two samples are required.
pub fn has_converged_precision(
    acc: &ObservableAccumulator,
    sites: usize,
    workers: usize,
    precision: f64,
    confidence_level: f64,
) -> bool {
    if acc.count() < 2.0 {
        return false;
    }
    let percentile = normal_quantile(1.0 - confidence_level);
    let threshold = (precision / percentile).powi(2);
    let workers = workers.max(1) as f64;
    let sites = sites.max(1) as f64;
    let energy_ok = acc.variance_of_mean_energy() / (sites * sites) / workers < threshold;
    energy_ok
        && acc
            .variance_of_mean_singlets()
            .iter()
            .all(|v| v / workers < threshold)
}

/// Quantile function of the standard normal distribution (Acklam).
///
/// Returns `-inf` / `+inf` at the closed ends and NaN outside `[0, 1]`.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}
