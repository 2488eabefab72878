use std::error::Error;

use clap::Args;
use sgc_mcmc::ParallelTempering;
use tracing::info;

use super::{seed_replica, RunArgs};

#[derive(Args, Debug)]
pub struct TemperArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

pub fn run(args: &TemperArgs) -> Result<(), Box<dyn Error>> {
    let file = args.run.load()?;
    let seed = seed_replica(&file, file.run.ladder.t_max)?;
    let mut tempering = ParallelTempering::from_seed(file.run, seed)?;
    let summary = tempering.run()?;

    for stats in &summary.exchange {
        info!(
            attempted = stats.attempted,
            accepted = stats.accepted,
            rate = stats.acceptance_rate(),
            "pair exchange"
        );
    }
    for thermo in &summary.thermodynamics {
        println!(
            "T={:.2} K  E={:.6} eV  Cv={:.6e} eV/K  samples={}",
            thermo.temperature, thermo.energy, thermo.heat_capacity, thermo.samples
        );
    }
    if let Some(path) = &summary.summary_path {
        println!("summary written to {}", path.display());
    }
    Ok(())
}
