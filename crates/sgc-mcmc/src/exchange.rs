use serde::{Deserialize, Serialize};
use sgc_core::{beta, EnergyModel, ErrorInfo, RngHandle, SgcError};
use tracing::{debug, info, Span};

use crate::replica::Replica;

/// Which adjacent pairs an exchange cycle attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairingDirection {
    /// Pairs `(0,1), (2,3), ...`.
    Up,
    /// Pairs `(1,2), (3,4), ...`.
    Down,
}

impl PairingDirection {
    /// Picks a direction with equal probability.
    pub fn choose(rng: &mut RngHandle) -> Self {
        if rng.uniform() < 0.5 {
            PairingDirection::Up
        } else {
            PairingDirection::Down
        }
    }

    /// Adjacent index pairs for a ladder of `len` rungs.
    pub fn pairs(self, len: usize) -> Vec<(usize, usize)> {
        let start = match self {
            PairingDirection::Up => 0,
            PairingDirection::Down => 1,
        };
        (start..len.saturating_sub(1))
            .step_by(2)
            .map(|i| (i, i + 1))
            .collect()
    }
}

/// Computes the Metropolis acceptance for exchanging two replicas.
pub fn exchange_acceptance(energy_a: f64, temp_a: f64, energy_b: f64, temp_b: f64) -> f64 {
    let delta = (beta(temp_a) - beta(temp_b)) * (energy_b - energy_a);
    (-delta).exp().min(1.0)
}

/// Attempts a replica exchange using the provided RNG handle.
pub fn attempt_exchange(
    energy_a: f64,
    temp_a: f64,
    energy_b: f64,
    temp_b: f64,
    rng: &mut RngHandle,
) -> (bool, f64) {
    let acceptance = exchange_acceptance(energy_a, temp_a, energy_b, temp_b);
    (rng.uniform() < acceptance, acceptance)
}

/// Swaps the configurations of rungs `i` and `j`.
pub fn swap_configurations<M: EnergyModel>(
    replicas: &mut [Replica<M>],
    i: usize,
    j: usize,
) -> Result<(), SgcError> {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    if lo == hi || hi >= replicas.len() {
        return Err(SgcError::Usage(
            ErrorInfo::new("swap-index", "swap needs two distinct rungs inside the ladder")
                .with_context("i", i.to_string())
                .with_context("j", j.to_string())
                .with_context("len", replicas.len().to_string()),
        ));
    }
    let (left, right) = replicas.split_at_mut(hi);
    left[lo].exchange_configuration(&mut right[0])
}

/// Running exchange counters for one adjacent pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PairStatistics {
    /// Swaps attempted.
    pub attempted: u64,
    /// Swaps accepted.
    pub accepted: u64,
    /// Sum of the acceptance probabilities of all attempts.
    pub probability_sum: f64,
}

impl PairStatistics {
    /// Accepted over attempted swaps.
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }

    /// Mean acceptance probability.
    pub fn mean_probability(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.probability_sum / self.attempted as f64
        }
    }
}

/// One attempted swap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairAttempt {
    /// Hotter rung of the pair; the colder one is `lower + 1`.
    pub lower: usize,
    /// Acceptance probability `min(1, p)`.
    pub probability: f64,
    /// Whether the configurations were exchanged.
    pub accepted: bool,
}

/// Outcome of one exchange cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    /// Zero-based cycle index.
    pub cycle: usize,
    /// Pairing used.
    pub direction: PairingDirection,
    /// Attempts in ladder order.
    pub attempts: Vec<PairAttempt>,
}

impl ExchangeReport {
    /// Number of accepted swaps.
    pub fn accepted(&self) -> usize {
        self.attempts.iter().filter(|a| a.accepted).count()
    }
}

/// Alternating adjacent-pair replica exchange.
#[derive(Debug, Clone)]
pub struct ExchangeScheduler {
    pairs: Vec<PairStatistics>,
    cycles: usize,
    span: Span,
}

impl ExchangeScheduler {
    /// Scheduler for a ladder of `rungs` replicas.
    pub fn new(rungs: usize) -> Self {
        Self {
            pairs: vec![PairStatistics::default(); rungs.saturating_sub(1)],
            cycles: 0,
            span: Span::none(),
        }
    }

    /// Attaches the span the scheduler logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Per-pair counters, hottest pair first.
    pub fn statistics(&self) -> &[PairStatistics] {
        &self.pairs
    }

    /// Cycles run so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// Runs one exchange cycle over `replicas`.
    ///
    /// Energies are the replicas' cached energies, which exclude the
    /// vibrational term.
    pub fn cycle<M: EnergyModel>(
        &mut self,
        replicas: &mut [Replica<M>],
        rng: &mut RngHandle,
    ) -> Result<ExchangeReport, SgcError> {
        let _entered = self.span.enter();
        if replicas.len().saturating_sub(1) != self.pairs.len() {
            return Err(SgcError::Usage(
                ErrorInfo::new("ladder-size", "scheduler was built for another ladder")
                    .with_context("expected", (self.pairs.len() + 1).to_string())
                    .with_context("actual", replicas.len().to_string()),
            ));
        }
        let direction = PairingDirection::choose(rng);
        let mut attempts = Vec::new();
        for (i, j) in direction.pairs(replicas.len()) {
            let (accepted, probability) = attempt_exchange(
                replicas[i].current_energy(),
                replicas[i].temperature(),
                replicas[j].current_energy(),
                replicas[j].temperature(),
                rng,
            );
            if accepted {
                swap_configurations(replicas, i, j)?;
            }
            let stats = &mut self.pairs[i];
            stats.attempted += 1;
            stats.probability_sum += probability;
            if accepted {
                stats.accepted += 1;
            }
            debug!(pair = i, probability, accepted, "exchange attempt");
            attempts.push(PairAttempt {
                lower: i,
                probability,
                accepted,
            });
        }
        let report = ExchangeReport {
            cycle: self.cycles,
            direction,
            attempts,
        };
        self.cycles += 1;
        info!(
            cycle = report.cycle,
            ?direction,
            attempted = report.attempts.len(),
            accepted = report.accepted(),
            "exchange cycle"
        );
        Ok(report)
    }
}
