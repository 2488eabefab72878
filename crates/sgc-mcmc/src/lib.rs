#![deny(missing_docs)]

//! Semi-grand-canonical Metropolis sampling with replica exchange.
//!
//! A [`Replica`] samples one configuration at one temperature. The
//! [`TemperatureLadderBuilder`] grows a ladder of replicas from a seed by
//! bisecting for a target exchange acceptance, and [`ParallelTempering`]
//! alternates parallel sampling with [`ExchangeScheduler`] swap cycles.

/// Statistic reduction across cooperating workers.
pub mod aggregate;
/// Integrated autocorrelation time estimation.
pub mod autocorrelation;
/// Chemical potentials folded into model coefficients.
pub mod bias;
/// YAML configuration schema and defaults.
pub mod config;
/// Equilibration and precision stopping rules.
pub mod convergence;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Replica exchange scheduling.
pub mod exchange;
/// Tempering driver and public `run` entry points.
pub mod kernel;
/// Adaptive temperature ladder and its persistence.
pub mod ladder;
/// Run manifest serialization helpers.
pub mod manifest;
/// Per-cycle metrics collection.
pub mod metrics;
/// Single-site trial moves and the Metropolis rule.
pub mod moves;
/// Running energy and singlet statistics.
pub mod observables;
/// One sampler at one temperature.
pub mod replica;

pub use aggregate::{ChannelReducer, LocalReducer, StatisticsReducer};
pub use bias::ChemicalPotentialBias;
pub use config::{
    EquilibrationConfig, ExchangeConfig, LadderConfig, OutputConfig, RunConfig, SamplingConfig,
    SamplingMode, SeedPolicy,
};
pub use convergence::{ConvergenceChecker, ConvergenceStatus, WindowStats};
pub use exchange::{ExchangeReport, ExchangeScheduler, PairStatistics, PairingDirection};
pub use kernel::{build_ladder, ParallelTempering, RunSummary};
pub use ladder::{Ladder, LadderTermination, RungRecord, TemperatureLadderBuilder};
pub use manifest::RunManifest;
pub use metrics::MetricSample;
pub use moves::MoveProposer;
pub use observables::{AccumulatorSnapshot, ObservableAccumulator};
pub use replica::{Replica, SamplingOutcome, Thermodynamics};
