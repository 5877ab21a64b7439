//! patchscope CLI - device update-management collection
//!
//! This CLI runs one bounded collection against a device:
//! - Resolve the device identity across the general directory and the
//!   device-management service
//! - Gather local probe evidence and remote management API data in
//!   parallel
//! - Arbitrate which management authority governs update configuration
//! - Render a JSON report with every issue encountered along the way

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod logging;
mod report;
mod run;

use error::CliResult;

/// patchscope CLI - update-management source-of-truth collector
#[derive(Parser)]
#[command(name = "patchscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one bounded collection against a device
    Collect(commands::collect::CollectArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = run_command(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run_command(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Collect(args) => commands::collect::execute(args).await,
    }
}
