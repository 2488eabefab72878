use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sgc_core::{EnergyModel, ErrorInfo, SgcError};
use tracing::{info, info_span, Span};

use crate::config::RunConfig;
use crate::convergence::ConvergenceStatus;
use crate::determinism;
use crate::exchange::{ExchangeReport, ExchangeScheduler, PairStatistics};
use crate::ladder::{Ladder, LadderTermination, RungRecord, TemperatureLadderBuilder};
use crate::manifest::{self, RunManifest};
use crate::metrics::{MetricSample, MetricsRecorder};
use crate::replica::{Replica, SamplingOutcome, Thermodynamics};

/// Summary returned to callers after a tempering run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Ladder temperatures, hottest first.
    pub temperatures: Vec<f64>,
    /// Ladder records as built or loaded.
    pub rungs: Vec<RungRecord>,
    /// How the ladder was obtained.
    pub termination: LadderTermination,
    /// Equilibration result per rung; empty when equilibration is disabled.
    pub equilibration: Vec<ConvergenceStatus>,
    /// Sampling outcome of the last cycle per rung.
    pub sampling: Vec<SamplingOutcome>,
    /// Thermodynamic averages per rung.
    pub thermodynamics: Vec<Thermodynamics>,
    /// Exchange counters per adjacent pair.
    pub exchange: Vec<PairStatistics>,
    /// Per-cycle exchange reports.
    pub reports: Vec<ExchangeReport>,
    /// Metrics CSV written during the run.
    pub metrics_path: Option<PathBuf>,
    /// Summary JSON path, if emitted.
    pub summary_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
    /// Metrics samples collected (useful for tests/diagnostics).
    pub samples: Vec<MetricSample>,
}

struct RunOutcome {
    equilibration: Vec<ConvergenceStatus>,
    sampling: Vec<SamplingOutcome>,
    thermodynamics: Vec<Thermodynamics>,
    reports: Vec<ExchangeReport>,
    recorder: MetricsRecorder,
}

/// Builds the temperature ladder for `config` from a seed replica.
///
/// The ladder file named by the configuration is read when present and
/// written after a fresh search. Configured chemical potentials are folded
/// into the seed first, so probe energies carry the same bias as the
/// exchange energies later on.
pub fn build_ladder<M: EnergyModel>(
    config: &RunConfig,
    mut seed: Replica<M>,
) -> Result<Ladder<M>, SgcError> {
    if !config.chemical_potentials.is_empty() && !seed.bias().is_active() {
        seed.apply_bias(&config.chemical_potentials)?;
    }
    let span = info_span!("ladder", t_max = config.ladder.t_max, t_min = config.ladder.t_min);
    let builder =
        TemperatureLadderBuilder::new(config.ladder.clone(), config.seed_policy.master_seed)?
            .with_span(span.clone());
    let path = config.ladder_path();
    let seed = seed.with_span(span);
    builder.build(seed, path.as_deref())
}

/// Parallel tempering driver over a built ladder.
#[derive(Debug)]
pub struct ParallelTempering<M: EnergyModel> {
    config: RunConfig,
    replicas: Vec<Replica<M>>,
    rungs: Vec<RungRecord>,
    termination: LadderTermination,
    scheduler: ExchangeScheduler,
    span: Span,
}

impl<M: EnergyModel> ParallelTempering<M> {
    /// Takes ownership of `ladder`; each rung logs under its own span.
    pub fn new(config: RunConfig, ladder: Ladder<M>) -> Result<Self, SgcError> {
        config.validate()?;
        if ladder.is_empty() {
            return Err(SgcError::configuration("empty-ladder", "the ladder has no rungs"));
        }
        let span = info_span!("tempering", rungs = ladder.len());
        let replicas = ladder
            .replicas
            .into_iter()
            .enumerate()
            .map(|(rung, replica)| {
                let temperature = replica.temperature();
                replica.with_span(info_span!(parent: &span, "replica", rung, temperature))
            })
            .collect::<Vec<_>>();
        let scheduler = ExchangeScheduler::new(replicas.len())
            .with_span(info_span!(parent: &span, "exchange"));
        Ok(Self {
            config,
            replicas,
            rungs: ladder.rungs,
            termination: ladder.termination,
            scheduler,
            span,
        })
    }

    /// Builds the ladder from `seed` and wraps it in a driver.
    pub fn from_seed(config: RunConfig, seed: Replica<M>) -> Result<Self, SgcError> {
        let ladder = build_ladder(&config, seed)?;
        Self::new(config, ladder)
    }

    /// Replicas, hottest first.
    pub fn replicas(&self) -> &[Replica<M>] {
        &self.replicas
    }

    /// Exchange scheduler state.
    pub fn scheduler(&self) -> &ExchangeScheduler {
        &self.scheduler
    }

    /// Runs equilibration, the exchange cycles and writes the run artefacts.
    ///
    /// Chemical potentials are folded into every replica that does not
    /// already carry them and every bias is reverted before returning.
    pub fn run(&mut self) -> Result<RunSummary, SgcError> {
        if !self.config.chemical_potentials.is_empty() {
            for replica in &mut self.replicas {
                if !replica.bias().is_active() {
                    replica.apply_bias(&self.config.chemical_potentials)?;
                }
            }
        }
        let outcome = self.run_biased();
        for replica in &mut self.replicas {
            if replica.bias().is_active() {
                replica.revert_bias()?;
            }
        }
        self.finish(outcome?)
    }

    fn run_biased(&mut self) -> Result<RunOutcome, SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.exchange.threads)
            .build()
            .map_err(|err| {
                SgcError::Configuration(
                    ErrorInfo::new("thread-pool", err.to_string())
                        .with_context("threads", self.config.exchange.threads.to_string()),
                )
            })?;
        let config = &self.config;

        let equilibration = if config.equilibration.enabled {
            pool.install(|| {
                self.replicas
                    .par_iter_mut()
                    .map(|replica| replica.equilibrate(&config.equilibration))
                    .collect::<Result<Vec<_>, SgcError>>()
            })?
        } else {
            Vec::new()
        };
        if config.sampling.estimate_correlation_time {
            pool.install(|| {
                self.replicas.par_iter_mut().try_for_each(|replica| {
                    replica
                        .estimate_correlation_time(config.sampling.correlation_sweeps)
                        .map(|_| ())
                })
            })?;
        }

        let mut recorder = MetricsRecorder::new();
        let mut reports = Vec::with_capacity(config.exchange.cycles);
        let mut sampling = Vec::new();
        for cycle in 0..config.exchange.cycles {
            sampling = pool.install(|| {
                self.replicas
                    .par_iter_mut()
                    .map(|replica| replica.run(&config.sampling))
                    .collect::<Result<Vec<_>, SgcError>>()
            })?;
            let mut rng = determinism::exchange_rng(config.seed_policy.master_seed, cycle);
            let report = self.scheduler.cycle(&mut self.replicas, &mut rng)?;
            record_cycle(&mut recorder, cycle, &self.replicas, &report);
            reports.push(report);
        }

        let thermodynamics = self
            .replicas
            .iter_mut()
            .map(|replica| replica.thermodynamics())
            .collect::<Result<Vec<_>, SgcError>>()?;
        info!(
            cycles = config.exchange.cycles,
            rungs = self.replicas.len(),
            "tempering finished"
        );
        Ok(RunOutcome {
            equilibration,
            sampling,
            thermodynamics,
            reports,
            recorder,
        })
    }

    fn finish(&self, outcome: RunOutcome) -> Result<RunSummary, SgcError> {
        let RunOutcome {
            equilibration,
            sampling,
            thermodynamics,
            reports,
            recorder,
        } = outcome;
        let output = &self.config.output;
        let run_dir = output.run_directory.clone();
        if let Some(dir) = &run_dir {
            fs::create_dir_all(dir).map_err(|err| {
                SgcError::Storage(
                    ErrorInfo::new("run-directory", err.to_string())
                        .with_context("path", dir.display().to_string()),
                )
            })?;
        }

        let metrics_path = match &run_dir {
            Some(_) => {
                let path = output.resolve(&output.metrics_file);
                recorder.write_csv(&path)?;
                Some(path)
            }
            None => None,
        };

        let mut summary = RunSummary {
            temperatures: self.rungs.iter().map(|rung| rung.temperature).collect(),
            rungs: self.rungs.clone(),
            termination: self.termination.clone(),
            equilibration,
            sampling,
            thermodynamics,
            exchange: self.scheduler.statistics().to_vec(),
            reports,
            metrics_path: metrics_path.clone(),
            summary_path: None,
            manifest_path: None,
            samples: recorder.samples().to_vec(),
        };

        if let Some(dir) = &run_dir {
            let summary_path = output.resolve(&output.summary_file);
            let manifest_path = output.resolve(&output.manifest_file);
            summary.summary_path = Some(summary_path.clone());
            summary.manifest_path = Some(manifest_path.clone());
            manifest::write_json(&summary_path, &summary, "summary")?;
            let manifest = RunManifest {
                config: self.config.clone(),
                config_hash: manifest::config_hash(&self.config)?,
                master_seed: self.config.seed_policy.master_seed,
                seed_label: self.config.seed_policy.label.clone(),
                temperatures: summary.temperatures.clone(),
                ladder: self.termination.clone(),
                ladder_file: self.config.ladder_path().map(|p| relative_to(&p, dir)),
                metrics_file: metrics_path.as_deref().map(|p| relative_to(p, dir)),
                summary_file: Some(relative_to(&summary_path, dir)),
            };
            manifest.write(&manifest_path)?;
        }
        Ok(summary)
    }
}

fn record_cycle<M: EnergyModel>(
    recorder: &mut MetricsRecorder,
    cycle: usize,
    replicas: &[Replica<M>],
    report: &ExchangeReport,
) {
    for (rung, replica) in replicas.iter().enumerate() {
        let swapped = report
            .attempts
            .iter()
            .any(|a| a.accepted && (a.lower == rung || a.lower + 1 == rung));
        recorder.push_sample(MetricSample {
            cycle,
            rung,
            temperature: replica.temperature(),
            energy: replica.current_energy(),
            mean_energy: replica.accumulator().mean_energy(),
            samples: replica.accumulator().count(),
            move_acceptance: replica.acceptance_rate(),
            swapped,
        });
    }
}

fn relative_to(path: &Path, dir: &Path) -> PathBuf {
    path.strip_prefix(dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
