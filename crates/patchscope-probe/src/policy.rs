//! Typed snapshots of probed policy groups.
//!
//! One variant per known schema; keys that match no known field stay in
//! the per-group catch-all rather than being dropped.

use serde::Serialize;

use crate::target::RawValues;

fn parse_flag(value: &str) -> Option<bool> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    match v {
        "0" => Some(false),
        "1" => Some(true),
        _ if v.eq_ignore_ascii_case("true") => Some(true),
        _ if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn parse_days(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Update-server assignment: on-prem or cloud endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateServerPolicy {
    pub use_wu_server: Option<bool>,
    pub server_url: Option<String>,
    pub status_url: Option<String>,
    pub unrecognized: RawValues,
}

impl UpdateServerPolicy {
    #[must_use]
    pub fn from_values(values: &RawValues) -> Self {
        let mut rest = values.clone();
        Self {
            use_wu_server: rest.take("UseWUServer").as_deref().and_then(parse_flag),
            server_url: rest.take("WUServer"),
            status_url: rest.take("WUStatusServer"),
            unrecognized: rest,
        }
    }

    /// Whether any update-server assignment is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.use_wu_server.is_some() || self.server_url.is_some()
    }
}

/// Update deferral and pause configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeferralPolicy {
    pub defer_feature_updates: Option<bool>,
    pub defer_feature_updates_days: Option<u32>,
    pub defer_quality_updates: Option<bool>,
    pub defer_quality_updates_days: Option<u32>,
    pub pause_feature_updates_start: Option<String>,
    pub pause_quality_updates_start: Option<String>,
    pub unrecognized: RawValues,
}

impl DeferralPolicy {
    #[must_use]
    pub fn from_values(values: &RawValues) -> Self {
        let mut rest = values.clone();
        Self {
            defer_feature_updates: rest
                .take("DeferFeatureUpdates")
                .as_deref()
                .and_then(parse_flag),
            defer_feature_updates_days: rest
                .take("DeferFeatureUpdatesPeriodInDays")
                .as_deref()
                .and_then(parse_days),
            defer_quality_updates: rest
                .take("DeferQualityUpdates")
                .as_deref()
                .and_then(parse_flag),
            defer_quality_updates_days: rest
                .take("DeferQualityUpdatesPeriodInDays")
                .as_deref()
                .and_then(parse_days),
            pause_feature_updates_start: rest.take("PauseFeatureUpdatesStartTime"),
            pause_quality_updates_start: rest.take("PauseQualityUpdatesStartTime"),
            unrecognized: rest,
        }
    }
}

/// Management agent presence on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentPresence {
    /// Agent service name when the service exists.
    pub service_name: Option<String>,
    /// Agent instrumentation namespace when present.
    pub namespace: Option<String>,
    pub unrecognized: RawValues,
}

impl AgentPresence {
    #[must_use]
    pub fn from_values(values: &RawValues) -> Self {
        let mut rest = values.clone();
        Self {
            service_name: rest.take("AgentService"),
            namespace: rest.take("AgentNamespace"),
            unrecognized: rest,
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.service_name.is_some() || self.namespace.is_some()
    }
}

/// Typed view of one probed policy group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySnapshot {
    UpdateServer(UpdateServerPolicy),
    Deferral(DeferralPolicy),
    Agent(AgentPresence),
}
