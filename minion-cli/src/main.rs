//! Minion: keep a record processor in sync with a registry.
//!
//! # Usage
//!
//! ```text
//! minion run      [--config <path>]
//! minion check    [--config <path>]
//! minion recrawl  [--url <minion url>]
//! minion progress [--url <minion url>] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, progress::ProgressArgs, recrawl::RecrawlArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(
    name = "minion",
    version,
    about = "Run and operate a registry synchronization minion",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the minion with the built-in logging handler.
    Run(RunArgs),

    /// Load and validate a config file without contacting the registry.
    Check(CheckArgs),

    /// Ask a running minion to start a full crawl.
    Recrawl(RecrawlArgs),

    /// Show crawl progress of a running minion.
    Progress(ProgressArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Recrawl(args) => args.run(),
        Commands::Progress(args) => args.run(),
    }
}
