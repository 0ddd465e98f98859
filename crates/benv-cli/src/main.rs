//! benv - build orchestrator for cabal plans
//!
//! Resolves seed packages into a build plan, fetches the plan's sources and
//! compiles, installs and registers every unit under a destination prefix.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod styles;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    benv_telemetry::init(cli.global.verbose);

    let exit_code = commands::run(cli).await?;

    std::process::exit(exit_code);
}
