//! Error types for the management API gateway.

use thiserror::Error;

/// Result type alias using [`GraphError`].
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when talking to the management API.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Call attempted while the session is disconnected. No network
    /// attempt is made.
    #[error("session is not connected")]
    NotConnected,

    /// The session lacks a permission scope required for the call.
    #[error("missing required scope: {scope}")]
    MissingScope { scope: String },

    /// Transient transport failure (HTTP 429 or 5xx), retried internally.
    #[error("retriable transport error (HTTP {status})")]
    Retriable {
        status: u16,
        /// Server-suggested delay from a `Retry-After` header, if any.
        retry_after_secs: Option<u64>,
    },

    /// Non-retriable transport failure, surfaced immediately.
    #[error("transport error (HTTP {status}) {code}: {message}")]
    NonRetriable {
        status: u16,
        code: String,
        message: String,
    },

    /// Retriable failures exhausted the attempt budget.
    #[error("maximum retries ({attempts}) exceeded: {last}")]
    MaxRetriesExceeded { attempts: u32, last: Box<GraphError> },

    /// The server reported the export job as failed. Not retried.
    #[error("export job failed: {message}")]
    JobFailed { message: String },

    /// The export job did not reach a terminal state in time. The job is
    /// abandoned, not cancelled remotely.
    #[error("export job timed out after {waited_secs}s")]
    JobTimeout { waited_secs: u64 },

    /// Malformed downloaded payload or response body.
    #[error("malformed payload: {0}")]
    Parse(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while handling a downloaded payload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Whether the gateway should retry after this failure.
    ///
    /// HTTP 429 and 5xx are retriable, as are connect/timeout failures
    /// below the HTTP layer. Everything else propagates immediately.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            GraphError::Retriable { .. } => true,
            GraphError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether this is a timeout of an export job, as opposed to a
    /// definitive failure. Callers use this to report "data unknown"
    /// rather than "no data".
    #[must_use]
    pub fn is_job_timeout(&self) -> bool {
        matches!(self, GraphError::JobTimeout { .. })
    }
}
