//! CLI error types and exit codes

use thiserror::Error;

use patchscope_graph::GraphError;
use patchscope_identity::IdentityError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Device identity unresolved
/// - 3: Network or session error
/// - 4: Usage or configuration error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid input: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Maps the error to a process exit code.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) | CliError::Config(_) => 4,
            CliError::Identity(e) if e.is_hard() => 2,
            CliError::Identity(IdentityError::Gateway(_)) => 3,
            CliError::Graph(
                GraphError::NotConnected
                | GraphError::Http(_)
                | GraphError::MaxRetriesExceeded { .. },
            ) => 3,
            _ => 1,
        }
    }

    /// Prints the error to stderr.
    pub fn print(&self) {
        eprintln!("error: {self}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage("bad flag".into()).exit_code(), 4);
        assert_eq!(CliError::Config("no token".into()).exit_code(), 4);
        assert_eq!(CliError::Graph(GraphError::NotConnected).exit_code(), 3);
        assert_eq!(
            CliError::Identity(IdentityError::unresolved("PC001", "no record")).exit_code(),
            2
        );
        assert_eq!(
            CliError::Graph(GraphError::Parse("bad payload".into())).exit_code(),
            1
        );
    }
}
