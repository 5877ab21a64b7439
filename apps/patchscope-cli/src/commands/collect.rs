//! Collect command - one bounded collection run against a device

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

use crate::config::AppConfig;
use crate::error::CliResult;
use crate::report;
use crate::run;

/// Collection categories that can be skipped for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkipCategory {
    /// Local/remote machine probes.
    Local,
    /// All remote management API collection.
    Remote,
    /// Directory group membership.
    Groups,
    /// The bulk export-job report.
    Export,
}

/// Arguments for the collect command
#[derive(Args, Debug)]
#[command(about = "Run one bounded collection against a device")]
pub struct CollectArgs {
    /// Device display name to collect against
    pub device_name: String,

    /// Tenant identifier (overrides PATCHSCOPE_TENANT)
    #[arg(long)]
    pub tenant: Option<String>,

    /// Known hardware id, used to disambiguate duplicate directory
    /// records
    #[arg(long)]
    pub hardware_id: Option<String>,

    /// Probe a named remote machine instead of the current one
    #[arg(long)]
    pub remote_host: Option<String>,

    /// Directory to write the JSON report into
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Collection categories to skip (repeatable)
    #[arg(long, value_enum)]
    pub skip: Vec<SkipCategory>,

    /// Overall wait budget for the export job, in seconds
    #[arg(long, default_value_t = 60)]
    pub max_wait_secs: u64,

    /// Emit the raw JSON report to stdout instead of the summary
    #[arg(long)]
    pub json: bool,
}

impl CollectArgs {
    pub(crate) fn skips(&self, category: SkipCategory) -> bool {
        self.skip.contains(&category)
    }

    pub(crate) fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Execute the collect command
pub async fn execute(args: CollectArgs) -> CliResult<()> {
    let config = AppConfig::load(args.tenant.clone())?;

    let run_report = run::collect(&config, &args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run_report)?);
    } else {
        report::print_summary(&run_report);
    }

    if let Some(ref dir) = args.output_dir {
        let path = report::write_report(&run_report, dir)?;
        if !args.json {
            println!("  Report written to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_categories() {
        let args = CollectArgs {
            device_name: "PC001".into(),
            tenant: None,
            hardware_id: None,
            remote_host: None,
            output_dir: None,
            skip: vec![SkipCategory::Export, SkipCategory::Groups],
            max_wait_secs: 90,
            json: false,
        };

        assert!(args.skips(SkipCategory::Export));
        assert!(args.skips(SkipCategory::Groups));
        assert!(!args.skips(SkipCategory::Local));
        assert_eq!(args.max_wait(), Duration::from_secs(90));
    }
}
