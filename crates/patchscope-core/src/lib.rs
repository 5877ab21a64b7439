//! patchscope Core Library
//!
//! Shared run-scoped state for patchscope.
//!
//! # Modules
//!
//! - [`ledger`] - Append-only issue ledger shared by all collection phases
//! - [`session`] - Connection state gating every remote call
//! - [`cache`] - Insert-if-absent memoization for name lookups
//!
//! # Example
//!
//! ```
//! use patchscope_core::{IssueLedger, Severity};
//!
//! let ledger = IssueLedger::new();
//! ledger.warning("identity", "directory object not resolved");
//!
//! let issues = ledger.snapshot();
//! assert_eq!(issues[0].severity, Severity::Warning);
//! ```

pub mod cache;
pub mod ledger;
pub mod session;

// Re-export main types for convenient access
pub use cache::NameCache;
pub use ledger::{IssueCounts, IssueLedger, IssueRecord, Severity};
pub use session::{SessionError, SessionState};
