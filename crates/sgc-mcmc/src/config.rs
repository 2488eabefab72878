use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};

/// YAML-configurable parameters governing a tempering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Temperature ladder search settings.
    #[serde(default)]
    pub ladder: LadderConfig,
    /// Replica exchange schedule.
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Sampling stage of every replica run.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Equilibration stage preceding sampling.
    #[serde(default)]
    pub equilibration: EquilibrationConfig,
    /// Chemical potentials keyed by singlet coefficient name (eV).
    #[serde(default)]
    pub chemical_potentials: BTreeMap<String, f64>,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ladder: LadderConfig::default(),
            exchange: ExchangeConfig::default(),
            sampling: SamplingConfig::default(),
            equilibration: EquilibrationConfig::default(),
            chemical_potentials: BTreeMap::new(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, SgcError> {
        let config: RunConfig = serde_yaml::from_str(text)
            .map_err(|err| SgcError::Serde(ErrorInfo::new("config-parse", err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, SgcError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            SgcError::Storage(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml(&text)
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), SgcError> {
        self.ladder.validate()?;
        for level in [
            self.equilibration.confidence_level,
            self.sampling.confidence_level(),
        ] {
            if !(level > 0.0 && level < 0.5) {
                return Err(SgcError::Configuration(
                    ErrorInfo::new("confidence-level", "confidence level must lie in (0, 0.5)")
                        .with_context("value", level.to_string()),
                ));
            }
        }
        if self.equilibration.enabled && self.equilibration.window_length == 0 {
            return Err(SgcError::configuration(
                "equilibration-window",
                "window_length must be positive",
            ));
        }
        if let Some((name, value)) = self
            .chemical_potentials
            .iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(SgcError::Usage(
                ErrorInfo::new("chemical-potential-value", "chemical potentials must be finite")
                    .with_context("name", name.clone())
                    .with_context("value", value.to_string()),
            ));
        }
        Ok(())
    }

    /// Ladder file location, resolved against the run directory when relative.
    pub fn ladder_path(&self) -> Option<PathBuf> {
        let file = self.ladder.scheme_file.as_ref()?;
        Some(self.output.resolve(file))
    }
}

/// Adaptive ladder search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Hottest temperature (K); the first rung.
    #[serde(default = "default_t_max")]
    pub t_max: f64,
    /// Temperature floor (K).
    #[serde(default = "default_t_min")]
    pub t_min: f64,
    /// Exchange acceptance targeted between adjacent rungs.
    #[serde(default = "default_target_acceptance")]
    pub target_acceptance: f64,
    /// Sweeps run at every probed temperature.
    #[serde(default = "default_sweeps_per_probe")]
    pub sweeps_per_probe: usize,
    /// Bisection stops once the acceptance is this close to the target.
    #[serde(default = "default_acceptance_tolerance")]
    pub acceptance_tolerance: f64,
    /// Bisection stops once the bracket is narrower than this (K).
    #[serde(default = "default_min_bracket")]
    pub min_bracket: f64,
    /// CSV file persisting the ladder between runs.
    #[serde(default = "default_scheme_file")]
    pub scheme_file: Option<PathBuf>,
}

fn default_t_max() -> f64 {
    1500.0
}

fn default_t_min() -> f64 {
    100.0
}

fn default_target_acceptance() -> f64 {
    0.2
}

fn default_sweeps_per_probe() -> usize {
    10
}

fn default_acceptance_tolerance() -> f64 {
    0.01
}

fn default_min_bracket() -> f64 {
    1e-4
}

fn default_scheme_file() -> Option<PathBuf> {
    Some(PathBuf::from("temp_scheme.csv"))
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            t_max: default_t_max(),
            t_min: default_t_min(),
            target_acceptance: default_target_acceptance(),
            sweeps_per_probe: default_sweeps_per_probe(),
            acceptance_tolerance: default_acceptance_tolerance(),
            min_bracket: default_min_bracket(),
            scheme_file: default_scheme_file(),
        }
    }
}

impl LadderConfig {
    /// Checks the temperature range and search tolerances.
    pub fn validate(&self) -> Result<(), SgcError> {
        if !(self.t_min > 0.0 && self.t_max > self.t_min && self.t_max.is_finite()) {
            return Err(SgcError::Configuration(
                ErrorInfo::new("ladder-range", "temperatures must satisfy 0 < t_min < t_max")
                    .with_context("t_min", self.t_min.to_string())
                    .with_context("t_max", self.t_max.to_string()),
            ));
        }
        if !(self.target_acceptance > 0.0 && self.target_acceptance < 1.0) {
            return Err(SgcError::configuration(
                "ladder-target",
                "target acceptance must lie strictly between 0 and 1",
            ));
        }
        if self.sweeps_per_probe == 0 {
            return Err(SgcError::configuration(
                "ladder-probe",
                "sweeps_per_probe must be positive",
            ));
        }
        if !(self.acceptance_tolerance > 0.0 && self.min_bracket > 0.0) {
            return Err(SgcError::Configuration(
                ErrorInfo::new("ladder-tolerance", "bisection tolerances must be positive")
                    .with_context("acceptance_tolerance", self.acceptance_tolerance.to_string())
                    .with_context("min_bracket", self.min_bracket.to_string()),
            ));
        }
        Ok(())
    }
}

/// Replica exchange schedule.
///
/// Every cycle runs the sampling stage on all replicas, then attempts swaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Number of run-then-exchange cycles.
    #[serde(default = "default_cycles")]
    pub cycles: usize,
    /// Worker threads used for replica sweeps (0 lets rayon decide).
    #[serde(default)]
    pub threads: usize,
}

fn default_cycles() -> usize {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            threads: 0,
        }
    }
}

/// Sampling stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// How long a replica samples.
    #[serde(default)]
    pub mode: SamplingMode,
    /// Estimate the energy correlation time before sampling.
    #[serde(default)]
    pub estimate_correlation_time: bool,
    /// Sweeps recorded for the correlation-time estimate.
    #[serde(default = "default_correlation_sweeps")]
    pub correlation_sweeps: usize,
}

fn default_correlation_sweeps() -> usize {
    50
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::default(),
            estimate_correlation_time: false,
            correlation_sweeps: default_correlation_sweeps(),
        }
    }
}

impl SamplingConfig {
    /// Confidence level used by precision mode (default when fixed).
    pub fn confidence_level(&self) -> f64 {
        match self.mode {
            SamplingMode::Precision {
                confidence_level, ..
            } => confidence_level,
            SamplingMode::Fixed { .. } => default_confidence_level(),
        }
    }
}

/// Closed set of sampling strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SamplingMode {
    /// Run a fixed number of sweeps.
    Fixed {
        /// Sweeps to run.
        #[serde(default = "default_fixed_sweeps")]
        sweeps: usize,
    },
    /// Run until the means reach the requested precision.
    Precision {
        /// Absolute precision on singlets and per-site energy.
        #[serde(default = "default_precision")]
        precision: f64,
        /// Confidence level of the precision test.
        #[serde(default = "default_confidence_level")]
        confidence_level: f64,
        /// Sweep budget.
        #[serde(default = "default_max_sweeps")]
        max_sweeps: usize,
        /// Sweeps between precision checks.
        #[serde(default = "default_check_interval")]
        check_interval: usize,
    },
}

fn default_fixed_sweeps() -> usize {
    100
}

fn default_precision() -> f64 {
    0.01
}

fn default_confidence_level() -> f64 {
    0.05
}

fn default_max_sweeps() -> usize {
    10_000
}

fn default_check_interval() -> usize {
    10
}

impl Default for SamplingMode {
    fn default() -> Self {
        SamplingMode::Fixed {
            sweeps: default_fixed_sweeps(),
        }
    }
}

/// Equilibration stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibrationConfig {
    /// Run the windowed equilibration test before sampling.
    #[serde(default = "default_equilibrate")]
    pub enabled: bool,
    /// Maximum number of windows.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Trial moves per window.
    #[serde(default = "default_window_length")]
    pub window_length: usize,
    /// Confidence level of the window-to-window test.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

fn default_equilibrate() -> bool {
    true
}

fn default_max_iterations() -> usize {
    1000
}

fn default_window_length() -> usize {
    1000
}

impl Default for EquilibrationConfig {
    fn default() -> Self {
        Self {
            enabled: default_equilibrate(),
            max_iterations: default_max_iterations(),
            window_length: default_window_length(),
            confidence_level: default_confidence_level(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Per-cycle metrics filename relative to `run_directory`.
    #[serde(default = "default_metrics_filename")]
    pub metrics_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Summary filename relative to `run_directory`.
    #[serde(default = "default_summary_filename")]
    pub summary_file: PathBuf,
}

fn default_metrics_filename() -> PathBuf {
    PathBuf::from("metrics.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_summary_filename() -> PathBuf {
    PathBuf::from("summary.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            metrics_file: default_metrics_filename(),
            manifest_file: default_manifest_filename(),
            summary_file: default_summary_filename(),
        }
    }
}

impl OutputConfig {
    /// Resolves `path` against the run directory when it is relative.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.run_directory {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
