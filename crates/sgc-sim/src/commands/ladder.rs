use std::error::Error;

use clap::Args;
use serde::Serialize;
use sgc_mcmc::{build_ladder, LadderTermination, RungRecord};
use tracing::info;

use super::{seed_replica, write_json, RunArgs};

#[derive(Args, Debug)]
pub struct LadderArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Serialize)]
struct LadderReport {
    temperatures: Vec<f64>,
    rungs: Vec<RungRecord>,
    termination: LadderTermination,
}

pub fn run(args: &LadderArgs) -> Result<(), Box<dyn Error>> {
    let file = args.run.load()?;
    let seed = seed_replica(&file, file.run.ladder.t_max)?;
    let ladder = build_ladder(&file.run, seed)?;
    let report = LadderReport {
        temperatures: ladder.temperatures(),
        rungs: ladder.rungs,
        termination: ladder.termination,
    };
    info!(rungs = report.rungs.len(), termination = ?report.termination, "ladder ready");
    write_json(args.run.out.join("ladder.json"), &report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
