//! Source-of-truth arbitration for patchscope
//!
//! Given the evidence collected from local and remote probes, this crate
//! decides which management authority currently governs update
//! configuration on a device. Arbitration is a pure function over the
//! full evidence set: re-running it with the same evidence always yields
//! an identical result, and evidence order never matters. The priority
//! order itself is data, an ordered rule table evaluated
//! first-match-wins, so it can be tested and extended without touching
//! control flow.

mod arbiter;
mod evidence;
mod rules;

// Re-exports
pub use arbiter::{arbitrate, Arbitration, Confidence};
pub use evidence::{Authority, Evidence};
pub use rules::{
    is_cloud_update_endpoint, rules, ArbitrationRule, AGENT_SIGNALS, DEFERRAL_SIGNALS,
    SIGNAL_UPDATE_SERVER, SIGNAL_USE_UPDATE_SERVER,
};
