use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sgc_core::{Configuration, EnergyModel, ErrorInfo, RngHandle, SgcError, BOLTZMANN_EV};
use tracing::{debug, info, warn, Span};

use crate::aggregate::{LocalReducer, StatisticsReducer};
use crate::autocorrelation;
use crate::bias::ChemicalPotentialBias;
use crate::config::{EquilibrationConfig, RunConfig, SamplingConfig, SamplingMode};
use crate::convergence::{self, ConvergenceChecker, ConvergenceStatus, WindowStats};
use crate::moves::{self, MoveProposer};
use crate::observables::ObservableAccumulator;

/// Thermodynamic averages reported by a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thermodynamics {
    /// Temperature (K).
    pub temperature: f64,
    /// Mean energy with the chemical-potential bias removed (eV).
    pub energy: f64,
    /// `var(E) / (kB T^2)` in eV/K, from the biased energy alone.
    ///
    /// The singlet cross term `sum_i mu_i (<x_i E> - <x_i><E>)` is not
    /// included, so with nonzero chemical potentials this is not the full
    /// semi-grand heat capacity.
    pub heat_capacity: f64,
    /// Number of samples behind the averages.
    pub samples: f64,
    /// Mean singlets keyed by coefficient name.
    pub singlets: BTreeMap<String, f64>,
    /// Per-sample singlet variances keyed by coefficient name.
    pub singlet_variances: BTreeMap<String, f64>,
    /// Chemical potentials keyed by coefficient name.
    pub chemical_potentials: BTreeMap<String, f64>,
    /// Fraction of accepted trial moves.
    pub acceptance_rate: f64,
    /// Integrated correlation time used for error bars, in samples.
    pub correlation_time: Option<f64>,
}

/// Result of a sampling stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingOutcome {
    /// Sweeps performed.
    pub sweeps: usize,
    /// Stopping state in precision mode; `None` for fixed-length runs.
    pub status: Option<ConvergenceStatus>,
}

/// One Metropolis sampler at a fixed temperature.
///
/// A replica owns its configuration, an energy model mirroring it, and the
/// statistics accumulated at its temperature. The cached energy includes any
/// folded chemical-potential bias and excludes the vibrational term.
pub struct Replica<M: EnergyModel> {
    temperature: f64,
    configuration: Configuration,
    model: M,
    proposer: MoveProposer,
    bias: ChemicalPotentialBias,
    accumulator: ObservableAccumulator,
    rng: RngHandle,
    energy: f64,
    accepted: u64,
    proposed: u64,
    reducer: Box<dyn StatisticsReducer>,
    span: Span,
}

impl<M: EnergyModel> fmt::Debug for Replica<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("temperature", &self.temperature)
            .field("energy", &self.energy)
            .field("sites", &self.configuration.len())
            .field("accepted", &self.accepted)
            .field("proposed", &self.proposed)
            .field("rank", &self.reducer.rank())
            .finish_non_exhaustive()
    }
}

impl<M: EnergyModel> Replica<M> {
    /// Creates a replica and initialises `model` from `configuration`.
    pub fn new(
        temperature: f64,
        configuration: Configuration,
        mut model: M,
        rng: RngHandle,
    ) -> Result<Self, SgcError> {
        check_temperature(temperature)?;
        if configuration.is_empty() {
            return Err(SgcError::configuration(
                "empty-configuration",
                "a replica needs at least one site",
            ));
        }
        model.initialize(&configuration)?;
        let accumulator = ObservableAccumulator::new(model.singlets().len());
        Ok(Self {
            temperature,
            energy: model.current_energy(),
            configuration,
            model,
            proposer: MoveProposer,
            bias: ChemicalPotentialBias::new(),
            accumulator,
            rng,
            accepted: 0,
            proposed: 0,
            reducer: Box::new(LocalReducer),
            span: Span::none(),
        })
    }

    /// Attaches the span events of this replica are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Joins a reduction group; statistics are then averaged across workers.
    pub fn with_reducer(mut self, reducer: Box<dyn StatisticsReducer>) -> Self {
        self.reducer = reducer;
        self
    }

    /// Deep copy of the configuration and model at a new temperature.
    ///
    /// Statistics and move counters start empty, the bias state is copied and
    /// the copy samples alone regardless of this replica's reducer.
    pub fn clone_reset(&self, temperature: f64, rng: RngHandle) -> Result<Self, SgcError> {
        check_temperature(temperature)?;
        let mut accumulator = ObservableAccumulator::new(self.accumulator.num_singlets());
        accumulator.set_correlation_time(self.accumulator.correlation_time());
        Ok(Self {
            temperature,
            configuration: self.configuration.clone(),
            model: self.model.clone(),
            proposer: self.proposer,
            bias: self.bias.clone(),
            accumulator,
            rng,
            energy: self.energy,
            accepted: 0,
            proposed: 0,
            reducer: Box::new(LocalReducer),
            span: self.span.clone(),
        })
    }

    /// Temperature (K).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Moves the replica to another temperature. Statistics are kept.
    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), SgcError> {
        check_temperature(temperature)?;
        self.temperature = temperature;
        Ok(())
    }

    /// Configuration currently owned by the replica.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Energy model mirroring the configuration.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Accumulated statistics.
    pub fn accumulator(&self) -> &ObservableAccumulator {
        &self.accumulator
    }

    /// Discards accumulated statistics.
    pub fn reset_statistics(&mut self) {
        self.accumulator.reset();
    }

    /// Active chemical-potential bias.
    pub fn bias(&self) -> &ChemicalPotentialBias {
        &self.bias
    }

    /// Cached energy used for exchange decisions.
    pub fn current_energy(&self) -> f64 {
        self.energy
    }

    /// Number of lattice sites.
    pub fn sites(&self) -> usize {
        self.configuration.len()
    }

    /// Accepted over proposed trial moves; zero before the first move.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }

    /// Folds chemical potentials into the model coefficients.
    pub fn apply_bias(&mut self, potentials: &BTreeMap<String, f64>) -> Result<(), SgcError> {
        self.bias.apply(&mut self.model, potentials)?;
        self.energy = self.model.current_energy();
        Ok(())
    }

    /// Restores the unbiased coefficients.
    pub fn revert_bias(&mut self) -> Result<(), SgcError> {
        self.bias.revert(&mut self.model)?;
        self.energy = self.model.current_energy();
        Ok(())
    }

    /// Rebuilds the model state from the owned configuration.
    pub fn resync(&mut self) -> Result<(), SgcError> {
        self.model.initialize(&self.configuration)?;
        self.energy = self.model.current_energy();
        Ok(())
    }

    /// Hands this replica's configuration to `other` and takes `other`'s.
    ///
    /// Temperatures and statistics stay where they are.
    pub fn exchange_configuration(&mut self, other: &mut Self) -> Result<(), SgcError> {
        std::mem::swap(&mut self.configuration, &mut other.configuration);
        self.resync()?;
        other.resync()
    }

    /// Proposes one single-site swap and applies the Metropolis rule.
    pub fn trial_move(&mut self) -> Result<bool, SgcError> {
        let change = self.proposer.propose(&self.configuration, &mut self.rng)?;
        let delta = self.model.apply_change(&self.configuration, &change)?;
        self.proposed += 1;
        if !moves::accept(delta, self.temperature, &mut self.rng) {
            self.model.revert_last_change();
            return Ok(false);
        }
        if let Err(err) = self.configuration.apply(&change) {
            self.model.revert_last_change();
            return Err(err);
        }
        self.energy += delta;
        self.accepted += 1;
        Ok(true)
    }

    fn record_sample(&mut self) -> Result<(), SgcError> {
        let energy = self.energy + self.model.vib_energy(self.temperature);
        self.accumulator.record(energy, &self.model.singlets())
    }

    /// One sweep: as many trial moves as there are sites, each followed by
    /// a recorded sample.
    pub fn sweep(&mut self) -> Result<(), SgcError> {
        for _ in 0..self.configuration.len() {
            self.trial_move()?;
            self.record_sample()?;
        }
        Ok(())
    }

    /// Runs `sweeps` recorded sweeps.
    pub fn run_sweeps(&mut self, sweeps: usize) -> Result<(), SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        for _ in 0..sweeps {
            self.sweep()?;
        }
        Ok(())
    }

    /// Resets the statistics, runs `sweeps` sweeps and returns the mean cached
    /// energy over the recorded trial moves.
    pub fn probe_mean_energy(&mut self, sweeps: usize) -> Result<f64, SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        self.accumulator.reset();
        let moves = sweeps * self.configuration.len();
        if moves == 0 {
            return Ok(self.energy);
        }
        let mut sum = 0.0;
        for _ in 0..moves {
            self.trial_move()?;
            self.record_sample()?;
            sum += self.energy;
        }
        Ok(sum / moves as f64)
    }

    /// Windowed equilibration followed by a statistics reset.
    pub fn equilibrate(
        &mut self,
        config: &EquilibrationConfig,
    ) -> Result<ConvergenceStatus, SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        let mut checker = ConvergenceChecker::new(config.confidence_level, config.max_iterations)?;
        while checker.status() == ConvergenceStatus::Sampling {
            self.accumulator.reset();
            for _ in 0..config.window_length {
                self.trial_move()?;
                self.record_sample()?;
            }
            let reduced = self.reduced_accumulator()?;
            checker.check(WindowStats::from_accumulator(
                &reduced,
                self.reducer.workers(),
            ));
        }
        self.accumulator.reset();
        match checker.status() {
            ConvergenceStatus::Converged => info!(
                temperature = self.temperature,
                windows = checker.iterations(),
                z = ?checker.last_z(),
                "equilibrated"
            ),
            status => warn!(
                temperature = self.temperature,
                windows = checker.iterations(),
                z = ?checker.last_z(),
                ?status,
                "equilibration budget exhausted"
            ),
        }
        Ok(checker.status())
    }

    /// Estimates the energy correlation time from `sweeps` unrecorded sweeps
    /// and stores it on the accumulator.
    pub fn estimate_correlation_time(&mut self, sweeps: usize) -> Result<Option<f64>, SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        let moves = sweeps * self.configuration.len();
        let mut series = Vec::with_capacity(moves);
        for _ in 0..moves {
            self.trial_move()?;
            series.push(self.energy);
        }
        let tau = autocorrelation::integrated_time(&series);
        self.accumulator.set_correlation_time(tau);
        debug!(temperature = self.temperature, tau = ?tau, "correlation time");
        Ok(self.accumulator.correlation_time())
    }

    /// Samples according to `config.mode`.
    pub fn run(&mut self, config: &SamplingConfig) -> Result<SamplingOutcome, SgcError> {
        match config.mode {
            SamplingMode::Fixed { sweeps } => {
                self.run_sweeps(sweeps)?;
                Ok(SamplingOutcome {
                    sweeps,
                    status: None,
                })
            }
            SamplingMode::Precision {
                precision,
                confidence_level,
                max_sweeps,
                check_interval,
            } => {
                let interval = check_interval.max(1);
                let mut sweeps = 0;
                let mut status = ConvergenceStatus::Sampling;
                while status == ConvergenceStatus::Sampling {
                    if sweeps >= max_sweeps {
                        status = ConvergenceStatus::MaxIterReached;
                        break;
                    }
                    let chunk = interval.min(max_sweeps - sweeps);
                    self.run_sweeps(chunk)?;
                    sweeps += chunk;
                    let reduced = self.reduced_accumulator()?;
                    if convergence::has_converged_precision(
                        &reduced,
                        self.sites(),
                        self.reducer.workers(),
                        precision,
                        confidence_level,
                    ) {
                        status = ConvergenceStatus::Converged;
                    }
                }
                let span = self.span.clone();
                let _entered = span.enter();
                info!(temperature = self.temperature, sweeps, ?status, "precision sampling finished");
                Ok(SamplingOutcome {
                    sweeps,
                    status: Some(status),
                })
            }
        }
    }

    /// Full semi-grand-canonical measurement: bias, equilibrate, sample,
    /// report and restore the coefficients.
    pub fn measure(&mut self, config: &RunConfig) -> Result<Thermodynamics, SgcError> {
        self.accumulator.reset();
        self.apply_bias(&config.chemical_potentials)?;
        let outcome = self.measure_biased(config);
        let reverted = self.revert_bias();
        let thermo = outcome?;
        reverted?;
        Ok(thermo)
    }

    fn measure_biased(&mut self, config: &RunConfig) -> Result<Thermodynamics, SgcError> {
        if config.equilibration.enabled {
            self.equilibrate(&config.equilibration)?;
        }
        if config.sampling.estimate_correlation_time {
            self.estimate_correlation_time(config.sampling.correlation_sweeps)?;
        }
        self.run(&config.sampling)?;
        self.thermodynamics()
    }

    /// Thermodynamic averages of the accumulated samples, reduced across the
    /// replica's workers.
    pub fn thermodynamics(&mut self) -> Result<Thermodynamics, SgcError> {
        let reduced = self.reduced_accumulator()?;
        let names = self.model.singlet_names();
        let potentials = self.bias.aligned(&names);
        let singlets = reduced.mean_singlets();
        let sites = self.sites() as f64;
        let energy = reduced.mean_energy()
            + potentials
                .iter()
                .zip(&singlets)
                .map(|(mu, x)| mu * x * sites)
                .sum::<f64>();
        let heat_capacity =
            reduced.variance_energy() / (BOLTZMANN_EV * self.temperature * self.temperature);
        Ok(Thermodynamics {
            temperature: self.temperature,
            energy,
            heat_capacity,
            samples: reduced.count(),
            singlets: names.iter().cloned().zip(singlets).collect(),
            singlet_variances: names
                .iter()
                .cloned()
                .zip(reduced.variance_singlets())
                .collect(),
            chemical_potentials: names.iter().cloned().zip(potentials).collect(),
            acceptance_rate: self.acceptance_rate(),
            correlation_time: reduced.correlation_time(),
        })
    }

    fn reduced_accumulator(&mut self) -> Result<ObservableAccumulator, SgcError> {
        let mut reduced = ObservableAccumulator::from_snapshot(
            self.reducer.all_reduce_mean(self.accumulator.snapshot())?,
        )?;
        reduced.set_correlation_time(self.accumulator.correlation_time());
        Ok(reduced)
    }
}

fn check_temperature(temperature: f64) -> Result<(), SgcError> {
    if temperature.is_finite() && temperature > 0.0 {
        return Ok(());
    }
    Err(SgcError::Configuration(
        ErrorInfo::new("temperature", "temperature must be positive and finite")
            .with_context("value", temperature.to_string()),
    ))
}
