pub mod ladder;
pub mod sgc;
pub mod temper;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use sgc_mcmc::determinism;

use crate::system::SimulationFile;

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML file with a `system` section and the run configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Output directory for run artefacts.
    #[arg(long)]
    pub out: PathBuf,
    /// Overrides `seed_policy.master_seed`.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    pub(crate) fn load(&self) -> Result<SimulationFile, Box<dyn Error>> {
        fs::create_dir_all(&self.out)?;
        let mut file = SimulationFile::load(&self.config, &self.out)?;
        if let Some(seed) = self.seed {
            file.run.seed_policy.master_seed = seed;
        }
        // Keep the input next to the artefacts.
        fs::copy(&self.config, self.out.join("config.yaml")).ok();
        Ok(file)
    }
}

pub(crate) fn seed_replica(
    file: &SimulationFile,
    temperature: f64,
) -> Result<sgc_mcmc::Replica<sgc_lattice::PairLatticeModel>, Box<dyn Error>> {
    let rng = determinism::replica_rng(file.run.seed_policy.master_seed, 0);
    Ok(file.system.replica(temperature, rng)?)
}

pub(crate) fn write_json<P: AsRef<Path>, T: serde::Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
