//! Lifts typed policy snapshots into arbitration evidence.

use patchscope_arbiter::{
    is_cloud_update_endpoint, Authority, Evidence, SIGNAL_UPDATE_SERVER, SIGNAL_USE_UPDATE_SERVER,
};

use crate::policy::{AgentPresence, DeferralPolicy, UpdateServerPolicy};

fn flag_str(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}

/// Evidence from an update-server assignment. The server URL is
/// categorized by whether it points at the cloud endpoint-update
/// service or an on-premises server.
#[must_use]
pub fn update_server_evidence(policy: &UpdateServerPolicy, source: &str) -> Vec<Evidence> {
    let mut out = Vec::new();

    if let Some(flag) = policy.use_wu_server {
        out.push(Evidence::new(
            Authority::Wsus,
            SIGNAL_USE_UPDATE_SERVER,
            flag_str(flag),
            source,
            40,
        ));
    }

    if let Some(ref url) = policy.server_url {
        if is_cloud_update_endpoint(url) {
            out.push(
                Evidence::new(Authority::Esus, SIGNAL_UPDATE_SERVER, url, source, 80)
                    .with_note("update server matches the cloud endpoint pattern"),
            );
        } else {
            out.push(Evidence::new(
                Authority::Wsus,
                SIGNAL_UPDATE_SERVER,
                url,
                source,
                40,
            ));
        }
    }

    out
}

/// Evidence from deferral/pause configuration: one record per signal
/// that is actually present.
#[must_use]
pub fn deferral_evidence(policy: &DeferralPolicy, source: &str) -> Vec<Evidence> {
    let mut out = Vec::new();
    let mut push = |signal: &str, value: Option<String>| {
        if let Some(value) = value {
            out.push(Evidence::new(Authority::Wufb, signal, value, source, 60));
        }
    };

    push(
        "DeferFeatureUpdates",
        policy.defer_feature_updates.map(|f| flag_str(f).to_string()),
    );
    push(
        "DeferFeatureUpdatesPeriodInDays",
        policy.defer_feature_updates_days.map(|d| d.to_string()),
    );
    push(
        "DeferQualityUpdates",
        policy.defer_quality_updates.map(|f| flag_str(f).to_string()),
    );
    push(
        "DeferQualityUpdatesPeriodInDays",
        policy.defer_quality_updates_days.map(|d| d.to_string()),
    );
    push(
        "PauseFeatureUpdatesStartTime",
        policy.pause_feature_updates_start.clone(),
    );
    push(
        "PauseQualityUpdatesStartTime",
        policy.pause_quality_updates_start.clone(),
    );

    out
}

/// Evidence from agent presence probes.
#[must_use]
pub fn agent_evidence(agent: &AgentPresence, source: &str) -> Vec<Evidence> {
    let mut out = Vec::new();

    if let Some(ref service) = agent.service_name {
        out.push(Evidence::new(
            Authority::Sccm,
            "AgentService",
            service,
            source,
            100,
        ));
    }
    if let Some(ref namespace) = agent.namespace {
        out.push(Evidence::new(
            Authority::Sccm,
            "AgentNamespace",
            namespace,
            source,
            100,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RawValues;
    use patchscope_arbiter::arbitrate;

    #[test]
    fn test_onprem_server_evidence() {
        let policy = UpdateServerPolicy::from_values(&RawValues::parse(
            "UseWUServer=1\nWUServer=https://wsus.contoso.com:8530\n",
        ));
        let evidence = update_server_evidence(&policy, "policy:WindowsUpdate");

        assert_eq!(evidence.len(), 2);
        assert!(evidence.iter().all(|e| e.authority == Authority::Wsus));
    }

    #[test]
    fn test_cloud_server_evidence_is_categorized_esus() {
        let policy = UpdateServerPolicy::from_values(&RawValues::parse(
            "UseWUServer=1\nWUServer=contoso.eus.wu.manage.microsoft.com\n",
        ));
        let evidence = update_server_evidence(&policy, "policy:WindowsUpdate");

        let url_evidence = evidence
            .iter()
            .find(|e| e.signal == SIGNAL_UPDATE_SERVER)
            .unwrap();
        assert_eq!(url_evidence.authority, Authority::Esus);
        assert_eq!(url_evidence.weight, 80);
    }

    #[test]
    fn test_cloud_server_end_to_end_wins_over_deferrals() {
        // UseWUServer=1 with a cloud endpoint URL plus deferral policy:
        // arbitration lands on the cloud endpoint-update service.
        let server = UpdateServerPolicy::from_values(&RawValues::parse(
            "UseWUServer=1\nWUServer=contoso.eus.wu.manage.microsoft.com\n",
        ));
        let deferral = DeferralPolicy::from_values(&RawValues::parse("DeferQualityUpdates=1\n"));

        let mut evidence = update_server_evidence(&server, "policy:WindowsUpdate");
        evidence.extend(deferral_evidence(&deferral, "policy:WindowsUpdate"));

        let result = arbitrate(&evidence);
        assert_eq!(result.label, "Intune (ESUS)");
        assert!(!result.co_managed);
    }

    #[test]
    fn test_deferral_evidence_only_for_present_signals() {
        let policy = DeferralPolicy::from_values(&RawValues::parse(
            "DeferQualityUpdates=1\nDeferQualityUpdatesPeriodInDays=7\n",
        ));
        let evidence = deferral_evidence(&policy, "policy:WindowsUpdate");

        assert_eq!(evidence.len(), 2);
        assert!(evidence.iter().all(|e| e.authority == Authority::Wufb));
    }

    #[test]
    fn test_agent_evidence() {
        let agent = AgentPresence::from_values(&RawValues::parse(
            "AgentService=CcmExec\nAgentNamespace=root\\ccm\n",
        ));
        let evidence = agent_evidence(&agent, "service:CcmExec");

        assert_eq!(evidence.len(), 2);
        let result = arbitrate(&evidence);
        assert_eq!(result.label, "SCCM");
    }
}
