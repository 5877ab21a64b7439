//! Asynchronous export-job protocol: create, poll, download, parse.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::Serialize;
use tar::Archive;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::backoff::Backoff;
use crate::error::{GraphError, GraphResult};
use crate::gateway::Gateway;

/// Default overall wait budget for an export job. Callers retrieving
/// larger reports may extend this to 90 s.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// Specification of a server-side export job.
#[derive(Debug, Clone, Serialize)]
pub struct ExportJobSpec {
    /// Server-side report name.
    pub report_name: String,
    /// Optional filter expression applied server-side.
    pub filter: Option<String>,
    /// Columns to materialize; empty means the report default.
    pub select: Vec<String>,
    /// Desired output format inside the archive.
    pub format: String,
}

impl ExportJobSpec {
    #[must_use]
    pub fn new(report_name: impl Into<String>) -> Self {
        Self {
            report_name: report_name.into(),
            filter: None,
            select: Vec::new(),
            format: "csv".to_string(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "reportName": self.report_name,
            "format": self.format,
        });
        if let Some(ref filter) = self.filter {
            body["filter"] = serde_json::Value::String(filter.clone());
        }
        if !self.select.is_empty() {
            body["select"] = serde_json::json!(self.select);
        }
        body
    }
}

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Created or still materializing. Unknown server states land here
    /// so a new state degrades to the timeout path, never a spurious
    /// failure.
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    fn from_wire(status: &str) -> Self {
        match status {
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

/// A server-side export job as last observed.
///
/// Created by a POST, mutated only by polling reads, terminal once
/// completed or failed.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id: String,
    pub status: JobStatus,
    /// Download reference, present once the job completes.
    pub download_url: Option<String>,
    pub created: Option<DateTime<Utc>>,
    /// Server-reported failure detail, if any.
    pub message: Option<String>,
}

impl ExportJob {
    /// Parses a job from the management API JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Parse`] if the job id is missing.
    pub fn from_json(value: &serde_json::Value) -> GraphResult<Self> {
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GraphError::Parse("export job response missing id".into()))?
            .to_string();

        let status = value
            .get("status")
            .and_then(|v| v.as_str())
            .map(JobStatus::from_wire)
            .unwrap_or(JobStatus::Pending);

        Ok(Self {
            id,
            status,
            download_url: value
                .get("url")
                .and_then(|v| v.as_str())
                .map(String::from),
            created: value
                .get("requestDateTime")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            message: value
                .get("statusDetail")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }
}

/// Parsed tabular payload of a completed export job. Field names come
/// from the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value by row index and column name.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// Runs an export job end to end with the standard poll schedule.
///
/// # Errors
///
/// Returns [`GraphError::JobFailed`] when the server reports failure,
/// [`GraphError::JobTimeout`] when `max_wait` elapses without a terminal
/// state, or [`GraphError::Parse`] for a malformed payload.
pub async fn run_export_job(
    gateway: &Gateway,
    spec: &ExportJobSpec,
    max_wait: Duration,
) -> GraphResult<ReportTable> {
    run_export_job_with(gateway, spec, max_wait, Backoff::polling()).await
}

/// Runs an export job with a custom poll schedule. Tests shrink the
/// schedule; production callers use [`run_export_job`].
#[instrument(skip(gateway, spec, poll_backoff), fields(report = %spec.report_name))]
pub async fn run_export_job_with(
    gateway: &Gateway,
    spec: &ExportJobSpec,
    max_wait: Duration,
    poll_backoff: Backoff,
) -> GraphResult<ReportTable> {
    let created = gateway
        .post("deviceManagement/reports/exportJobs", &spec.to_body())
        .await?;
    let job = ExportJob::from_json(&created)?;
    info!(job_id = %job.id, "export job created");

    let poll_uri = format!("deviceManagement/reports/exportJobs('{}')", job.id);
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        let value = gateway.get(&poll_uri).await?;
        let job = ExportJob::from_json(&value)?;

        match job.status {
            JobStatus::Completed => {
                let url = job.download_url.ok_or_else(|| {
                    GraphError::Parse("completed export job carries no download reference".into())
                })?;
                debug!(job_id = %job.id, polls, "export job completed");
                let bytes = gateway.download(&url).await?;
                return parse_export_archive(&bytes);
            }
            JobStatus::Failed => {
                return Err(GraphError::JobFailed {
                    message: job
                        .message
                        .unwrap_or_else(|| "export job reported failed".to_string()),
                });
            }
            JobStatus::Pending => {}
        }

        if started.elapsed() >= max_wait {
            // Abandoned, not cancelled remotely.
            return Err(GraphError::JobTimeout {
                waited_secs: started.elapsed().as_secs(),
            });
        }

        let delay = poll_backoff.delay_for(polls);
        debug!(job_id = %job.id, poll = polls, delay_ms = delay.as_millis() as u64, "job pending");
        tokio::time::sleep(delay).await;
        polls += 1;
    }
}

/// Extracts the single tabular file from a gzipped tar archive and
/// parses it into rows of named fields.
///
/// Scratch space lives in a [`tempfile::TempDir`], removed on every exit
/// path when the guard drops.
///
/// # Errors
///
/// Returns [`GraphError::Parse`] when the archive is malformed or does
/// not contain exactly one tabular file.
pub fn parse_export_archive(bytes: &[u8]) -> GraphResult<ReportTable> {
    let scratch = tempfile::tempdir()?;

    let decoder = GzDecoder::new(bytes);
    let mut archive = Archive::new(decoder);
    let mut table_path = None;

    let entries = archive
        .entries()
        .map_err(|e| GraphError::Parse(format!("unreadable archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| GraphError::Parse(format!("unreadable archive: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| GraphError::Parse(format!("unreadable archive entry: {e}")))?;

        let is_tabular = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_tabular {
            continue;
        }
        if table_path.is_some() {
            return Err(GraphError::Parse(
                "archive contains more than one tabular file".into(),
            ));
        }

        let file_name = path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .ok_or_else(|| GraphError::Parse("archive entry has no file name".into()))?;
        let dest = scratch.path().join(file_name);
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| GraphError::Parse(format!("unreadable archive entry: {e}")))?;
        std::fs::write(&dest, contents)?;
        table_path = Some(dest);
    }

    let path =
        table_path.ok_or_else(|| GraphError::Parse("archive contains no tabular file".into()))?;

    let mut reader = csv::Reader::from_path(&path)
        .map_err(|e| GraphError::Parse(format!("unreadable tabular file: {e}")))?;
    let columns = reader
        .headers()
        .map_err(|e| GraphError::Parse(format!("missing header row: {e}")))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| GraphError::Parse(format!("malformed row: {e}")))?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(ReportTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn archive_with(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, contents) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_parse_archive_single_csv() {
        let bytes = archive_with(&[(
            "DeviceReport.csv",
            "DeviceName,UpdateRing\nPC001,Broad\nPC002,Pilot\n",
        )]);

        let table = parse_export_archive(&bytes).unwrap();
        assert_eq!(table.columns, vec!["DeviceName", "UpdateRing"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, "DeviceName"), Some("PC001"));
        assert_eq!(table.cell(1, "UpdateRing"), Some("Pilot"));
    }

    #[test]
    fn test_parse_archive_ignores_non_tabular_members() {
        let bytes = archive_with(&[
            ("manifest.json", "{}"),
            ("DeviceReport.csv", "DeviceName\nPC001\n"),
        ]);

        let table = parse_export_archive(&bytes).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_parse_archive_rejects_multiple_tables() {
        let bytes = archive_with(&[("a.csv", "X\n1\n"), ("b.csv", "Y\n2\n")]);

        let err = parse_export_archive(&bytes).unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[test]
    fn test_parse_archive_rejects_missing_table() {
        let bytes = archive_with(&[("manifest.json", "{}")]);

        let err = parse_export_archive(&bytes).unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[test]
    fn test_job_status_from_wire() {
        assert_eq!(JobStatus::from_wire("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from_wire("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::from_wire("notStarted"), JobStatus::Pending);
        assert_eq!(JobStatus::from_wire("inProgress"), JobStatus::Pending);
        // Unknown server states degrade to pending, not failure.
        assert_eq!(JobStatus::from_wire("archiving"), JobStatus::Pending);
    }

    #[test]
    fn test_export_job_from_json() {
        let value = serde_json::json!({
            "id": "job-1",
            "status": "completed",
            "url": "https://example.test/payload.tar.gz",
            "requestDateTime": "2024-03-01T09:30:00Z"
        });

        let job = ExportJob::from_json(&value).unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.download_url.as_deref(),
            Some("https://example.test/payload.tar.gz")
        );
        assert!(job.created.is_some());
    }

    #[test]
    fn test_export_job_missing_id_is_parse_error() {
        let err = ExportJob::from_json(&serde_json::json!({"status": "completed"})).unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[test]
    fn test_spec_body_shape() {
        let spec = ExportJobSpec::new("Devices")
            .with_filter("DeviceId eq 'd-1'")
            .with_select(&["DeviceName", "UpdateRing"]);
        let body = spec.to_body();

        assert_eq!(body["reportName"], "Devices");
        assert_eq!(body["format"], "csv");
        assert_eq!(body["filter"], "DeviceId eq 'd-1'");
        assert_eq!(body["select"][1], "UpdateRing");
    }
}
