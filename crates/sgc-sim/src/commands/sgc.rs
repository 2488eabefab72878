use std::error::Error;

use clap::Args;

use super::{seed_replica, write_json, RunArgs};

#[derive(Args, Debug)]
pub struct SgcArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// Temperature of the measurement (K).
    #[arg(long)]
    pub temperature: f64,
}

pub fn run(args: &SgcArgs) -> Result<(), Box<dyn Error>> {
    let file = args.run.load()?;
    let mut replica = seed_replica(&file, args.temperature)?;
    let thermo = replica.measure(&file.run)?;
    write_json(args.run.out.join("thermodynamics.json"), &thermo)?;
    println!("{}", serde_json::to_string_pretty(&thermo)?);
    Ok(())
}
