// SPDX-License-Identifier: MIT

//! `cond` - the study conductor CLI: expand a study spec into an execution
//! graph, launch the conductor that drives it, and inspect/control a study
//! already in flight.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cond",
    version,
    about = "Expand a study spec into a DAG and drive it to completion"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a study spec and launch its conductor
    Run(commands::run::RunArgs),
    /// Print the status snapshot for one or more studies
    Status(commands::status::StatusArgs),
    /// Drop the cancel sentinel for one or more studies
    Cancel(commands::cancel::CancelArgs),
    /// Write the update sentinel for one or more studies
    Update(commands::update::UpdateArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = dispatch().await {
        eprintln!("Error: {e}");
        std::process::exit(exit_code(&e));
    }
}

async fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Status(args) => commands::status::execute(args),
        Commands::Cancel(args) => commands::cancel::execute(args),
        Commands::Update(args) => commands::update::execute(args),
    }
}

/// Spec validation and dependency-acquisition failures exit 2; everything
/// else that aborts a command (a fatal conductor error, a bad argument)
/// exits 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<cond_spec::SpecError>().is_some()
        || err.downcast_ref::<cond_spec::DependencyError>().is_some()
        || err.downcast_ref::<cond_spec::GeneratorError>().is_some()
    {
        2
    } else {
        1
    }
}
