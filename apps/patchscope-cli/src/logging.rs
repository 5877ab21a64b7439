//! Logging initialisation for the CLI.
//!
//! Diagnostics go to stderr via `tracing`; the issue ledger is part of
//! the report output and is separate from logging.

use tracing_subscriber::EnvFilter;

/// Initialises the global subscriber. `RUST_LOG` wins over the
/// verbosity flags when set.
pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
