//! Device identity resolution for patchscope
//!
//! Maps a human-readable device name to a canonical set of
//! cross-referenced identifiers in two federated directories: the
//! general directory service and the device-management service. Stale
//! and duplicate directory records are expected; resolution runs a
//! four-phase algorithm with a deterministic tie-break and recovers
//! missing cross-references through the stable hardware id shared by
//! both directories.

mod error;
mod model;
mod resolver;
mod sources;

// Re-exports
pub use error::{IdentityError, IdentityResult};
pub use model::{DeviceIdentity, DirectoryDevice, IdentityField, ManagedDevice};
pub use resolver::{resolve, ResolveRequest};
pub use sources::{DirectorySource, GraphDirectory, GraphManagement, ManagementSource};
