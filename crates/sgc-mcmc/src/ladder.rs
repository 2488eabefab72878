use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sgc_core::{beta, EnergyModel, ErrorInfo, SgcError};
use tracing::{debug, info, warn, Span};

use crate::config::LadderConfig;
use crate::determinism;
use crate::replica::Replica;

/// Comment line written at the top of every ladder file.
pub const LADDER_HEADER: &str = "# Temperature (K), Acceptance probability";

const MAX_BISECTIONS: usize = 64;

/// One persisted ladder position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RungRecord {
    /// Temperature of the rung (K).
    pub temperature: f64,
    /// Exchange acceptance measured against the previous rung; zero for the first.
    pub acceptance: f64,
    /// Width of the bisection bracket when the rung was fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracket_width: Option<f64>,
}

/// Why the ladder stopped growing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LadderTermination {
    /// Halving the coldest rung would cross the temperature floor.
    ReachedMinimum,
    /// No colder temperature above the floor met the target; the ladder was truncated.
    SearchExhausted {
        /// Lowest trial temperature probed before giving up (K).
        floor: f64,
    },
    /// Temperatures were read back from a ladder file.
    LoadedFromFile {
        /// File the ladder came from.
        path: PathBuf,
    },
}

/// Replicas ordered from hottest to coldest together with their records.
#[derive(Debug)]
pub struct Ladder<M: EnergyModel> {
    /// Replicas, hottest first.
    pub replicas: Vec<Replica<M>>,
    /// One record per replica, same order.
    pub rungs: Vec<RungRecord>,
    /// How construction ended.
    pub termination: LadderTermination,
}

impl<M: EnergyModel> Ladder<M> {
    /// Rung temperatures, hottest first.
    pub fn temperatures(&self) -> Vec<f64> {
        self.rungs.iter().map(|rung| rung.temperature).collect()
    }

    /// Number of rungs.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Returns true when the ladder holds no replica.
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Exchange acceptance `exp((1/kB T_cur - 1/kB T_trial)(E_cur - E_trial))`.
pub fn ladder_acceptance(
    current_energy: f64,
    trial_energy: f64,
    current_temperature: f64,
    trial_temperature: f64,
) -> f64 {
    ((beta(current_temperature) - beta(trial_temperature)) * (current_energy - trial_energy)).exp()
}

enum Step<M: EnergyModel> {
    Rung {
        replica: Replica<M>,
        record: RungRecord,
        mean_energy: f64,
    },
    Exhausted {
        floor: f64,
    },
    Floor,
}

/// Adaptive temperature ladder construction.
#[derive(Debug, Clone)]
pub struct TemperatureLadderBuilder {
    config: LadderConfig,
    master_seed: u64,
    span: Span,
}

impl TemperatureLadderBuilder {
    /// Creates a builder; cloned replicas draw their RNG from `master_seed`.
    pub fn new(config: LadderConfig, master_seed: u64) -> Result<Self, SgcError> {
        config.validate()?;
        Ok(Self {
            config,
            master_seed,
            span: Span::none(),
        })
    }

    /// Attaches the span the builder logs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Builds the ladder starting from `seed`, which becomes the first rung.
    ///
    /// When `path` names a readable ladder file its temperatures are used
    /// directly. Otherwise the adaptive search runs and its result is written
    /// to `path`. Storage failures are logged, never returned.
    pub fn build<M: EnergyModel>(
        &self,
        mut seed: Replica<M>,
        path: Option<&Path>,
    ) -> Result<Ladder<M>, SgcError> {
        let span = self.span.clone();
        let _entered = span.enter();
        if let Some(path) = path {
            match load_ladder(path) {
                Ok(records) => return self.from_records(seed, records, path),
                Err(err) => warn!(path = %path.display(), error = %err, "ladder file unavailable; searching"),
            }
        }
        seed.set_temperature(self.config.t_max)?;
        let ladder = self.search(seed)?;
        if let Some(path) = path {
            match save_ladder(path, &ladder.rungs) {
                Ok(()) => info!(path = %path.display(), rungs = ladder.len(), "ladder saved"),
                Err(err) => warn!(path = %path.display(), error = %err, "ladder not saved"),
            }
        }
        Ok(ladder)
    }

    fn from_records<M: EnergyModel>(
        &self,
        mut seed: Replica<M>,
        records: Vec<RungRecord>,
        path: &Path,
    ) -> Result<Ladder<M>, SgcError> {
        seed.set_temperature(records[0].temperature)?;
        seed.reset_statistics();
        let mut replicas = vec![seed];
        for (rung, record) in records.iter().enumerate().skip(1) {
            let previous = &replicas[rung - 1];
            let replica = previous.clone_reset(
                record.temperature,
                determinism::replica_rng(self.master_seed, rung),
            )?;
            replicas.push(replica);
        }
        info!(path = %path.display(), rungs = replicas.len(), "ladder loaded");
        Ok(Ladder {
            replicas,
            rungs: records,
            termination: LadderTermination::LoadedFromFile {
                path: path.to_path_buf(),
            },
        })
    }

    fn search<M: EnergyModel>(&self, mut seed: Replica<M>) -> Result<Ladder<M>, SgcError> {
        let mut current_energy = seed.probe_mean_energy(self.config.sweeps_per_probe)?;
        seed.reset_statistics();
        let mut rungs = vec![RungRecord {
            temperature: seed.temperature(),
            acceptance: 0.0,
            bracket_width: None,
        }];
        let mut replicas = vec![seed];
        info!(rung = 0, temperature = self.config.t_max, "ladder seeded");
        let termination = loop {
            let current = &replicas[replicas.len() - 1];
            match self.next_rung(current, current_energy, replicas.len())? {
                Step::Rung {
                    replica,
                    record,
                    mean_energy,
                } => {
                    info!(
                        rung = replicas.len(),
                        temperature = record.temperature,
                        acceptance = record.acceptance,
                        "ladder rung"
                    );
                    current_energy = mean_energy;
                    rungs.push(record);
                    replicas.push(replica);
                }
                Step::Exhausted { floor } => {
                    warn!(
                        rungs = replicas.len(),
                        floor,
                        t_min = self.config.t_min,
                        "no colder rung meets the target acceptance; ladder truncated"
                    );
                    break LadderTermination::SearchExhausted { floor };
                }
                Step::Floor => {
                    info!(rungs = replicas.len(), "ladder reached the temperature floor");
                    break LadderTermination::ReachedMinimum;
                }
            }
        };
        Ok(Ladder {
            replicas,
            rungs,
            termination,
        })
    }

    fn next_rung<M: EnergyModel>(
        &self,
        current: &Replica<M>,
        current_energy: f64,
        rung: usize,
    ) -> Result<Step<M>, SgcError> {
        let cfg = &self.config;
        let t_cur = current.temperature();

        // Coarse halving until the acceptance drops to the target.
        let mut trial = t_cur / 2.0;
        if trial <= cfg.t_min {
            return Ok(Step::Floor);
        }
        let mut candidate =
            current.clone_reset(t_cur, determinism::replica_rng(self.master_seed, rung))?;
        let mut floor = trial;
        let mut found = None;
        while trial > cfg.t_min {
            candidate.set_temperature(trial)?;
            let energy = candidate.probe_mean_energy(cfg.sweeps_per_probe)?;
            let acceptance = ladder_acceptance(current_energy, energy, t_cur, trial);
            debug!(trial, acceptance, "coarse probe");
            floor = trial;
            if acceptance <= cfg.target_acceptance {
                found = Some(trial);
                break;
            }
            trial /= 2.0;
        }
        let Some(lower) = found else {
            return Ok(Step::Exhausted { floor });
        };

        // Bisection on [lower, t_cur].
        let mut lower = lower;
        let mut upper = t_cur;
        let mut iterations = 0;
        let (temperature, acceptance, mean_energy) = loop {
            iterations += 1;
            let temperature = 0.5 * (lower + upper);
            candidate.set_temperature(temperature)?;
            let energy = candidate.probe_mean_energy(cfg.sweeps_per_probe)?;
            let acceptance = ladder_acceptance(current_energy, energy, t_cur, temperature);
            debug!(temperature, acceptance, lower, upper, "bisection probe");
            if acceptance > cfg.target_acceptance {
                upper = temperature;
            } else {
                lower = temperature;
            }
            if (acceptance - cfg.target_acceptance).abs() < cfg.acceptance_tolerance
                || upper - lower < cfg.min_bracket
                || iterations >= MAX_BISECTIONS
            {
                break (temperature, acceptance, energy);
            }
        };
        candidate.reset_statistics();
        Ok(Step::Rung {
            replica: candidate,
            record: RungRecord {
                temperature,
                acceptance,
                bracket_width: Some(upper - lower),
            },
            mean_energy,
        })
    }
}

/// Writes `rungs` as CSV under the ladder header comment.
pub fn save_ladder(path: &Path, rungs: &[RungRecord]) -> Result<(), SgcError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| storage("ladder-mkdir", err, parent))?;
    }
    let mut file = File::create(path).map_err(|err| storage("ladder-create", err, path))?;
    writeln!(file, "{LADDER_HEADER}").map_err(|err| storage("ladder-write", err, path))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    for rung in rungs {
        writer
            .write_record([rung.temperature.to_string(), rung.acceptance.to_string()])
            .map_err(|err| storage("ladder-write", err, path))?;
    }
    writer.flush().map_err(|err| storage("ladder-write", err, path))
}

/// Reads a ladder file written by [`save_ladder`].
///
/// The first row is the hottest rung. Files that are empty, hold non-positive
/// temperatures or are not strictly decreasing are rejected.
pub fn load_ladder(path: &Path) -> Result<Vec<RungRecord>, SgcError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|err| storage("ladder-open", err, path))?;
    let mut rungs: Vec<RungRecord> = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|err| storage("ladder-read", err, path))?;
        let field = |idx: usize| -> Result<f64, SgcError> {
            record
                .get(idx)
                .ok_or_else(|| malformed(path, row, "missing column"))?
                .parse::<f64>()
                .map_err(|err| malformed(path, row, &err.to_string()))
        };
        let temperature = field(0)?;
        let acceptance = if record.len() > 1 { field(1)? } else { 0.0 };
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(malformed(path, row, "temperature must be positive"));
        }
        if rungs.last().is_some_and(|last| temperature >= last.temperature) {
            return Err(malformed(path, row, "temperatures must decrease"));
        }
        rungs.push(RungRecord {
            temperature,
            acceptance,
            bracket_width: None,
        });
    }
    if rungs.is_empty() {
        return Err(malformed(path, 0, "no rungs"));
    }
    Ok(rungs)
}

fn storage(code: &str, err: impl ToString, path: &Path) -> SgcError {
    SgcError::Storage(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn malformed(path: &Path, row: usize, reason: &str) -> SgcError {
    SgcError::Storage(
        ErrorInfo::new("ladder-malformed", reason)
            .with_context("path", path.display().to_string())
            .with_context("row", row.to_string()),
    )
}
