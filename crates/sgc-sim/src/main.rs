use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    ladder::{self, LadderArgs},
    sgc::{self, SgcArgs},
    temper::{self, TemperArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;
mod system;

#[derive(Parser, Debug)]
#[command(
    name = "sgc-sim",
    about = "Semi-grand-canonical Monte Carlo with parallel tempering"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the temperature ladder, or reuse the persisted one.
    Ladder(LadderArgs),
    /// Run replica exchange over the ladder.
    Temper(TemperArgs),
    /// Measure thermodynamic averages at one temperature.
    Sgc(SgcArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ladder(args) => ladder::run(&args),
        Command::Temper(args) => temper::run(&args),
        Command::Sgc(args) => sgc::run(&args),
    }
}
