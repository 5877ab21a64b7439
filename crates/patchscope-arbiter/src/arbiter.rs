//! The arbitration function.

use serde::Serialize;

use crate::evidence::{Authority, Evidence};
use crate::rules::rules;

/// Confidence in the arbitration outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Deterministic result of arbitrating an evidence set.
///
/// Derived purely from the evidence: recomputing with the same set
/// yields an identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Arbitration {
    /// The authority in effective control of update management.
    pub effective: Authority,
    /// Display label; the co-managed case merges both authorities.
    pub label: String,
    /// All detected authorities, highest priority first.
    pub detected: Vec<Authority>,
    pub confidence: Confidence,
    pub co_managed: bool,
    /// Which late-arriving signal would change the answer, if any.
    pub override_risk: Option<String>,
}

/// Decides the effective management authority for the evidence set.
///
/// Pure and order-independent: predicates are evaluated over the whole
/// set, the priority-ordered rule table picks the winner, and the sole
/// recognized co-management combination (on-prem server plus deferral
/// policy) merges into a combined label. Late evidence simply re-enters
/// this function; a client-side agent signal discovered after an initial
/// determination therefore overwrites it.
#[must_use]
pub fn arbitrate(evidence: &[Evidence]) -> Arbitration {
    let detected: Vec<Authority> = rules()
        .iter()
        .filter(|rule| rule.authority != Authority::Unmanaged && (rule.detect)(evidence))
        .map(|rule| rule.authority)
        .collect();

    let effective = detected.first().copied().unwrap_or(Authority::Unmanaged);

    let co_managed = detected.contains(&Authority::Wufb)
        && detected.contains(&Authority::Wsus)
        && matches!(effective, Authority::Wufb | Authority::Wsus);

    let label = if co_managed {
        "WSUS + WUFB".to_string()
    } else {
        effective.label().to_string()
    };

    let supporting = evidence
        .iter()
        .filter(|e| e.authority == effective && e.is_set())
        .count();
    let confidence = match effective {
        Authority::Unmanaged => Confidence::Low,
        Authority::Sccm | Authority::Esus => Confidence::High,
        _ if co_managed || supporting >= 2 => Confidence::High,
        _ => Confidence::Medium,
    };

    let override_risk = match effective {
        Authority::Sccm => None,
        _ => Some(format!(
            "a {} signal discovered later in the run would take precedence over {}",
            Authority::Sccm.label(),
            label
        )),
    };

    Arbitration {
        effective,
        label,
        detected,
        confidence,
        co_managed,
        override_risk,
    }
}
