//! Error types for probe execution.

use thiserror::Error;

/// Result type alias using [`ProbeError`].
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur when running a device probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe process could not be launched.
    #[error("failed to launch probe '{name}': {source}")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The probe ran but exited unsuccessfully.
    #[error("probe '{name}' failed (exit code {code:?}): {stderr}")]
    Failed {
        name: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The probe exceeded its own timeout. Terminates that probe only.
    #[error("probe '{name}' timed out after {secs}s")]
    Timeout { name: String, secs: u64 },
}
