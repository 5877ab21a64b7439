//! Append-only issue ledger shared by all collection phases.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of a recorded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Short label used in the rendered report.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single issue captured during a collection run.
///
/// Immutable once created; the ledger only appends.
#[derive(Debug, Clone, Serialize)]
pub struct IssueRecord {
    pub severity: Severity,
    /// Name of the collection phase that produced the issue.
    pub phase: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Per-severity counts over a ledger snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueCounts {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
}

/// Append-only, internally synchronized record of run issues.
///
/// A handle (usually `Arc<IssueLedger>`) is passed explicitly to every
/// collection function; there is no process-wide instance. Entries are
/// never mutated or removed, and concurrent appends from parallel
/// collection tracks are safe.
#[derive(Debug, Default)]
pub struct IssueLedger {
    entries: Mutex<Vec<IssueRecord>>,
}

impl IssueLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue to the ledger.
    pub fn record(&self, severity: Severity, phase: &str, message: impl Into<String>) {
        let record = IssueRecord {
            severity,
            phase: phase.to_string(),
            message: message.into(),
            at: Utc::now(),
        };
        self.entries
            .lock()
            .expect("issue ledger lock poisoned")
            .push(record);
    }

    pub fn info(&self, phase: &str, message: impl Into<String>) {
        self.record(Severity::Info, phase, message);
    }

    pub fn warning(&self, phase: &str, message: impl Into<String>) {
        self.record(Severity::Warning, phase, message);
    }

    pub fn error(&self, phase: &str, message: impl Into<String>) {
        self.record(Severity::Error, phase, message);
    }

    /// Returns all entries in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IssueRecord> {
        self.entries
            .lock()
            .expect("issue ledger lock poisoned")
            .clone()
    }

    /// Per-severity totals for the current contents.
    #[must_use]
    pub fn counts(&self) -> IssueCounts {
        let entries = self.entries.lock().expect("issue ledger lock poisoned");
        let mut counts = IssueCounts::default();
        for entry in entries.iter() {
            match entry.severity {
                Severity::Info => counts.info += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Error => counts.error += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.counts().error > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_preserves_append_order() {
        let ledger = IssueLedger::new();
        ledger.info("identity", "phase 1 started");
        ledger.warning("identity", "two candidates for name");
        ledger.error("export", "job failed");

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].message, "phase 1 started");
        assert_eq!(snapshot[1].severity, Severity::Warning);
        assert_eq!(snapshot[2].phase, "export");
    }

    #[test]
    fn test_counts() {
        let ledger = IssueLedger::new();
        ledger.info("a", "one");
        ledger.warning("b", "two");
        ledger.warning("b", "three");

        let counts = ledger.counts();
        assert_eq!(counts.info, 1);
        assert_eq!(counts.warning, 2);
        assert_eq!(counts.error, 0);
        assert!(!ledger.has_errors());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let ledger = IssueLedger::new();
        ledger.info("a", "one");

        let snapshot = ledger.snapshot();
        ledger.info("a", "two");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(ledger.snapshot().len(), 2);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let ledger = Arc::new(IssueLedger::new());
        let mut handles = Vec::new();

        for track in 0..4 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    ledger.info(&format!("track-{track}"), format!("entry {i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.snapshot().len(), 1000);
        assert_eq!(ledger.counts().info, 1000);
    }
}
