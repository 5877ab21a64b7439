//! Connection state for the remote management API.

use std::sync::Mutex;

use thiserror::Error;

/// Errors raised by session-state checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// An operation required a connected session.
    #[error("session is not connected")]
    NotConnected,

    /// The session is connected but lacks a granted permission scope.
    #[error("missing required scope: {scope}")]
    MissingScope { scope: String },
}

#[derive(Debug, Default)]
struct SessionInner {
    connected: bool,
    tenant_id: Option<String>,
    scopes: Vec<String>,
}

/// Process-owned session state: connected flag, granted scopes, tenant.
///
/// Created at startup, destroyed at process exit. Every gateway call
/// checks it before touching the network; callers never lock it
/// themselves.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
}

impl SessionState {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the session connected with the granted scopes.
    pub fn connect(&self, tenant_id: &str, scopes: &[&str]) {
        let mut inner = self.inner.lock().expect("session lock poisoned");
        inner.connected = true;
        inner.tenant_id = Some(tenant_id.to_string());
        inner.scopes = scopes.iter().map(|s| (*s).to_string()).collect();
    }

    /// Drops the connection; subsequent gateway calls fail fast.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock().expect("session lock poisoned");
        inner.connected = false;
        inner.tenant_id = None;
        inner.scopes.clear();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().expect("session lock poisoned").connected
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("session lock poisoned")
            .tenant_id
            .clone()
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.inner
            .lock()
            .expect("session lock poisoned")
            .scopes
            .iter()
            .any(|s| s == scope)
    }

    /// Fails with [`SessionError::NotConnected`] unless connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is disconnected.
    pub fn require_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    /// Fails unless the session is connected and holds the scope.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] if disconnected, or
    /// [`SessionError::MissingScope`] if the scope was not granted.
    pub fn require_scope(&self, scope: &str) -> Result<(), SessionError> {
        self.require_connected()?;
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(SessionError::MissingScope {
                scope: scope.to_string(),
            })
        }
    }
}
