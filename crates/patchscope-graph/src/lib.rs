//! Management API gateway for patchscope
//!
//! This crate wraps all outbound calls to the remote management API:
//!
//! - Session-gated requests that fail fast while disconnected
//! - Automatic pagination over `value` / `@odata.nextLink` envelopes
//! - Retry with exponential backoff for rate-limited (429) and
//!   server-side (5xx) failures
//! - The asynchronous export-job protocol: create, poll on an adaptive
//!   schedule, download the archived payload and parse the tabular file
//!
//! The gateway is a pure transport concern: every attempt is logged via
//! `tracing`, but recording collection issues is the caller's job.

mod backoff;
mod error;
mod export;
mod gateway;

// Re-exports
pub use backoff::{Backoff, BackoffSchedule};
pub use error::{GraphError, GraphResult};
pub use export::{
    parse_export_archive, run_export_job, run_export_job_with, ExportJob, ExportJobSpec, JobStatus,
    ReportTable, DEFAULT_MAX_WAIT,
};
pub use gateway::{Gateway, GatewayConfig, ODataError, ODataErrorBody, PageEnvelope};
