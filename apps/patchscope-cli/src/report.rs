//! Final report assembly and rendering.
//!
//! The JSON report is the canonical output; the summary is a terminal
//! rendering of the same structure. Conversion to other formats is a
//! downstream concern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use patchscope_arbiter::{Arbitration, Confidence, Evidence};
use patchscope_core::{IssueCounts, IssueRecord, Severity};
use patchscope_graph::ReportTable;
use patchscope_identity::DeviceIdentity;
use patchscope_probe::PolicySnapshot;

use crate::error::CliResult;

/// A directory group the device is a member of.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMembership {
    pub id: String,
    pub name: String,
}

/// Outcome of the export-job collection step. "unknown (timeout)" is
/// deliberately distinct from an empty table: the first means the data
/// could not be determined, the second that there is none.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSection {
    pub status: String,
    pub table: Option<ReportTable>,
}

impl ExportSection {
    #[must_use]
    pub fn ok(table: ReportTable) -> Self {
        Self {
            status: "ok".to_string(),
            table: Some(table),
        }
    }

    #[must_use]
    pub fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            table: None,
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            status: "failed".to_string(),
            table: None,
        }
    }

    #[must_use]
    pub fn timed_out() -> Self {
        Self {
            status: "unknown (timeout)".to_string(),
            table: None,
        }
    }
}

/// The reconciled output of one collection run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Probe target: localhost or the remote machine name.
    pub target: String,
    pub device: DeviceIdentity,
    pub arbitration: Arbitration,
    /// All evidence, ordered by weight for display.
    pub evidence: Vec<Evidence>,
    pub policies: Vec<PolicySnapshot>,
    pub device_detail: Option<serde_json::Value>,
    pub groups: Option<Vec<GroupMembership>>,
    pub export: ExportSection,
    pub issue_counts: IssueCounts,
    pub issues: Vec<IssueRecord>,
}

fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
    }
}

/// Prints the human-readable summary.
pub fn print_summary(report: &Report) {
    println!();
    println!("patchscope - {}", report.device.device_name);
    println!("═══════════════════════════════════════════════════════");
    println!();
    println!("  Effective source:   {}", report.arbitration.label);
    println!(
        "  Confidence:         {}",
        confidence_label(report.arbitration.confidence)
    );
    if report.arbitration.co_managed {
        println!("  Co-managed:         yes");
    }
    if report.arbitration.detected.is_empty() {
        println!("  Detected:           none");
    } else {
        let detected: Vec<&str> = report
            .arbitration
            .detected
            .iter()
            .map(|a| a.label())
            .collect();
        println!("  Detected:           {}", detected.join(", "));
    }
    if let Some(ref risk) = report.arbitration.override_risk {
        println!("  Override risk:      {risk}");
    }

    if !report.evidence.is_empty() {
        println!();
        println!("  Evidence:");
        for e in &report.evidence {
            println!(
                "    [{:>3}] {:<32} = {}  ({})",
                e.weight, e.signal, e.value, e.source
            );
        }
    }

    println!();
    if let Some(ref groups) = report.groups {
        println!("  Group memberships:  {}", groups.len());
    }
    match report.export.table {
        Some(ref table) => println!(
            "  Export report:      {} ({} rows)",
            report.export.status,
            table.rows.len()
        ),
        None => println!("  Export report:      {}", report.export.status),
    }

    let counts = report.issue_counts;
    println!(
        "  Issues:             {} error(s), {} warning(s), {} info",
        counts.error, counts.warning, counts.info
    );
    for issue in &report.issues {
        if issue.severity >= Severity::Warning {
            println!(
                "    [{:<7}] {}: {}",
                issue.severity.label(),
                issue.phase,
                issue.message
            );
        }
    }
    println!();
}

/// Writes the JSON report under the output directory and returns the
/// path.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or the file
/// cannot be written.
pub fn write_report(report: &Report, dir: &Path) -> CliResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stamp = report.generated_at.format("%Y%m%d-%H%M%S");
    let path = dir.join(format!(
        "patchscope-{}-{stamp}.json",
        sanitize(&report.device.device_name)
    ));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchscope_arbiter::arbitrate;

    fn sample_report() -> Report {
        Report {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            target: "localhost".to_string(),
            device: DeviceIdentity {
                device_name: "PC001".to_string(),
                ..DeviceIdentity::default()
            },
            arbitration: arbitrate(&[]),
            evidence: Vec::new(),
            policies: Vec::new(),
            device_detail: None,
            groups: None,
            export: ExportSection::timed_out(),
            issue_counts: IssueCounts::default(),
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample_report();

        let path = write_report(&report, dir.path()).unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["device"]["device_name"], "PC001");
        assert_eq!(parsed["export"]["status"], "unknown (timeout)");
        assert_eq!(parsed["arbitration"]["label"], "Unmanaged");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize("PC001"), "PC001");
        assert_eq!(sanitize("srv/file:name"), "srv_file_name");
    }

    #[test]
    fn test_export_section_statuses() {
        assert_eq!(ExportSection::skipped().status, "skipped");
        assert_eq!(ExportSection::failed().status, "failed");
        assert!(ExportSection::ok(ReportTable::default()).table.is_some());
    }
}
