//! zendb: incremental help-desk feed synchronizer.
//!
//! # Usage
//!
//! ```text
//! zendb run [--config PATH]
//! zendb sync [--config PATH] [--json]
//! zendb checkpoints [--config PATH] [--json]
//! zendb exec [--config PATH] <SQL>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{checkpoints::CheckpointsArgs, exec::ExecArgs, run::RunArgs, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "zendb",
    version,
    about = "Mirror help-desk feeds into a local SQLite database",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sync passes on the configured interval until ctrl-c.
    Run(RunArgs),

    /// Run a single sync pass and print its report.
    Sync(SyncArgs),

    /// Show the stored checkpoint of every feed.
    Checkpoints(CheckpointsArgs),

    /// Execute one raw SQL statement against the sink database.
    Exec(ExecArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Checkpoints(args) => args.run(),
        Commands::Exec(args) => args.run(),
    }
}
