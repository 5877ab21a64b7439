//! Detection predicates and the priority-ordered rule table.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::evidence::{Authority, Evidence};

/// Update-server URL signal name.
pub const SIGNAL_UPDATE_SERVER: &str = "WUServer";

/// "Use external update server" flag signal name.
pub const SIGNAL_USE_UPDATE_SERVER: &str = "UseWUServer";

/// Deferral/pause signals that indicate an MDM deferral policy.
pub const DEFERRAL_SIGNALS: &[&str] = &[
    "DeferFeatureUpdates",
    "DeferFeatureUpdatesPeriodInDays",
    "DeferQualityUpdates",
    "DeferQualityUpdatesPeriodInDays",
    "PauseFeatureUpdatesStartTime",
    "PauseQualityUpdatesStartTime",
];

/// Signals that indicate the client-side management agent.
pub const AGENT_SIGNALS: &[&str] = &["AgentService", "AgentNamespace"];

/// Hostname pattern of the cloud endpoint-update service.
static CLOUD_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|\.)manage\.microsoft\.com$").expect("cloud endpoint pattern is valid")
});

/// Whether an update-server URL points at the cloud endpoint-update
/// service rather than an on-premises server.
#[must_use]
pub fn is_cloud_update_endpoint(url: &str) -> bool {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let host = without_scheme
        .split(|c| c == '/' || c == '?')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default();
    CLOUD_ENDPOINT.is_match(host)
}

/// Agent detected: a local service/namespace signal is present.
#[must_use]
pub fn agent_detected(evidence: &[Evidence]) -> bool {
    evidence
        .iter()
        .any(|e| AGENT_SIGNALS.contains(&e.signal.as_str()) && e.is_set())
}

/// Cloud endpoint-update detected: an update-server URL matches the
/// cloud endpoint pattern.
#[must_use]
pub fn cloud_endpoint_detected(evidence: &[Evidence]) -> bool {
    evidence
        .iter()
        .any(|e| e.signal == SIGNAL_UPDATE_SERVER && is_cloud_update_endpoint(&e.value))
}

/// Deferral policy detected: any of the fixed deferral/pause signals is
/// present.
#[must_use]
pub fn deferral_detected(evidence: &[Evidence]) -> bool {
    evidence
        .iter()
        .any(|e| DEFERRAL_SIGNALS.contains(&e.signal.as_str()) && e.is_set())
}

/// On-premises server detected: the "use external server" flag is set
/// and the server URL does not match the cloud pattern.
#[must_use]
pub fn onprem_server_detected(evidence: &[Evidence]) -> bool {
    let flag_set = evidence
        .iter()
        .any(|e| e.signal == SIGNAL_USE_UPDATE_SERVER && e.is_set());
    let onprem_url = evidence.iter().any(|e| {
        e.signal == SIGNAL_UPDATE_SERVER
            && !e.value.trim().is_empty()
            && !is_cloud_update_endpoint(&e.value)
    });
    flag_set && onprem_url
}

fn unmanaged_detected(_evidence: &[Evidence]) -> bool {
    true
}

/// One entry of the arbitration table.
pub struct ArbitrationRule {
    pub authority: Authority,
    /// Informational weight for display ordering of the authority's
    /// evidence.
    pub weight: u32,
    pub detect: fn(&[Evidence]) -> bool,
}

/// The priority order as data: highest first, evaluated
/// first-match-wins. The terminal rule always matches.
#[must_use]
pub fn rules() -> &'static [ArbitrationRule] {
    static RULES: [ArbitrationRule; 5] = [
        ArbitrationRule {
            authority: Authority::Sccm,
            weight: 100,
            detect: agent_detected,
        },
        ArbitrationRule {
            authority: Authority::Esus,
            weight: 80,
            detect: cloud_endpoint_detected,
        },
        ArbitrationRule {
            authority: Authority::Wufb,
            weight: 60,
            detect: deferral_detected,
        },
        ArbitrationRule {
            authority: Authority::Wsus,
            weight: 40,
            detect: onprem_server_detected,
        },
        ArbitrationRule {
            authority: Authority::Unmanaged,
            weight: 0,
            detect: unmanaged_detected,
        },
    ];
    &RULES
}
