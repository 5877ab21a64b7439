//! Error types for identity resolution.

use thiserror::Error;

/// Result type alias using [`IdentityError`].
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur while resolving a device identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No management-service record could be resolved. Hard failure:
    /// callers that need the managed-device id cannot proceed.
    #[error("identity unresolved for '{device_name}': {reason}")]
    Unresolved { device_name: String, reason: String },

    /// A directory record was missing a required field.
    #[error("malformed directory record: {0}")]
    Malformed(String),

    /// A lookup against a directory source failed.
    #[error("directory lookup failed: {0}")]
    Gateway(#[from] patchscope_graph::GraphError),
}

impl IdentityError {
    #[must_use]
    pub fn unresolved(device_name: &str, reason: impl Into<String>) -> Self {
        Self::Unresolved {
            device_name: device_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this failure is fatal for callers that need the
    /// management-service id.
    #[must_use]
    pub fn is_hard(&self) -> bool {
        matches!(self, IdentityError::Unresolved { .. })
    }
}
