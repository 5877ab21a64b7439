//! Run orchestration: identity first, then the local and remote
//! collection tracks in parallel, then arbitration.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use patchscope_arbiter::{arbitrate, Evidence};
use patchscope_core::{IssueLedger, NameCache, SessionState};
use patchscope_graph::{run_export_job, ExportJobSpec, Gateway, GatewayConfig};
use patchscope_identity::{
    resolve, DeviceIdentity, GraphDirectory, GraphManagement, ResolveRequest,
};
use patchscope_probe::{
    agent_evidence, deferral_evidence, update_server_evidence, win, AgentPresence, DeferralPolicy,
    ExecRunner, PolicySnapshot, ProbeRunner, RawValues, UpdateServerPolicy,
};

use crate::commands::collect::{CollectArgs, SkipCategory};
use crate::config::{AppConfig, REQUIRED_SCOPES};
use crate::error::CliResult;
use crate::report::{ExportSection, GroupMembership, Report};

/// Shared run state threaded through both tracks.
struct RunContext {
    gateway: Arc<Gateway>,
    ledger: Arc<IssueLedger>,
    cache: Arc<NameCache>,
}

#[derive(Default)]
struct LocalOutcome {
    evidence: Vec<Evidence>,
    policies: Vec<PolicySnapshot>,
}

struct RemoteOutcome {
    evidence: Vec<Evidence>,
    policies: Vec<PolicySnapshot>,
    device_detail: Option<serde_json::Value>,
    groups: Option<Vec<GroupMembership>>,
    export: ExportSection,
}

impl Default for RemoteOutcome {
    fn default() -> Self {
        Self {
            evidence: Vec::new(),
            policies: Vec::new(),
            device_detail: None,
            groups: None,
            export: ExportSection::skipped(),
        }
    }
}

/// Runs one bounded collection and assembles the report.
///
/// Identity resolution is the only fatal step; every other collection
/// step is fault-isolated into the ledger so the run always completes
/// with gaps reported rather than a crash.
#[instrument(skip(config, args), fields(device = %args.device_name))]
pub async fn collect(config: &AppConfig, args: &CollectArgs) -> CliResult<Report> {
    let session = Arc::new(SessionState::new());
    session.connect(&config.tenant_id, REQUIRED_SCOPES);

    let gateway = Arc::new(Gateway::new(
        GatewayConfig::new(&config.api_url, &config.access_token),
        session,
    )?);
    let ctx = RunContext {
        gateway,
        ledger: Arc::new(IssueLedger::new()),
        cache: Arc::new(NameCache::new()),
    };

    // Identity first: almost everything downstream needs it, and the
    // run is meaningless without the managed-device id.
    let directory = GraphDirectory::new(ctx.gateway.clone());
    let management = GraphManagement::new(ctx.gateway.clone());
    let identity = resolve(
        &directory,
        &management,
        &ctx.ledger,
        &ResolveRequest {
            device_name: &args.device_name,
            hardware_id: args.hardware_id.as_deref(),
        },
    )
    .await?;
    let managed_device_id = identity.require_managed_device_id()?.to_string();
    if identity.is_partial() {
        ctx.ledger
            .info("identity", "identity partially resolved; continuing with reduced data");
    }

    // Both tracks run concurrently and join explicitly before
    // arbitration.
    let (local, remote) = tokio::join!(
        local_track(&ctx, args),
        remote_track(&ctx, args, &identity, &managed_device_id),
    );

    let mut evidence = local.evidence;
    evidence.extend(remote.evidence);
    // Weight ordering is informational, for display and debugging only.
    evidence.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.signal.cmp(&b.signal))
    });

    let arbitration = arbitrate(&evidence);
    info!(effective = %arbitration.label, co_managed = arbitration.co_managed, "arbitration complete");

    let mut policies = local.policies;
    policies.extend(remote.policies);

    Ok(Report {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        target: args
            .remote_host
            .clone()
            .unwrap_or_else(|| "localhost".to_string()),
        device: identity,
        arbitration,
        evidence,
        policies,
        device_detail: remote.device_detail,
        groups: remote.groups,
        export: remote.export,
        issue_counts: ctx.ledger.counts(),
        issues: ctx.ledger.snapshot(),
    })
}

const LOCAL_PHASE: &str = "local-probes";

/// Local track: machine probes for update-server assignment, deferral
/// policy and agent presence. Each probe failure is recorded and the
/// remaining probes still run.
async fn local_track(ctx: &RunContext, args: &CollectArgs) -> LocalOutcome {
    let mut out = LocalOutcome::default();

    if args.skips(SkipCategory::Local) {
        ctx.ledger.info(LOCAL_PHASE, "skipped by request");
        return out;
    }

    let runner = match &args.remote_host {
        Some(host) => ExecRunner::remote(host.clone()),
        None => ExecRunner::local(),
    };
    let policy_source = format!("registry:{}", win::UPDATE_POLICY_PATH);

    match runner.run(&win::update_server_probe()).await {
        Ok(values) => {
            let policy = UpdateServerPolicy::from_values(&values);
            if policy.is_configured() {
                out.evidence
                    .extend(update_server_evidence(&policy, &policy_source));
            }
            out.policies.push(PolicySnapshot::UpdateServer(policy));
        }
        Err(e) => {
            ctx.ledger
                .warning(LOCAL_PHASE, format!("update-server probe failed: {e}"));
        }
    }

    match runner.run(&win::deferral_probe()).await {
        Ok(values) => {
            let policy = DeferralPolicy::from_values(&values);
            out.evidence
                .extend(deferral_evidence(&policy, &policy_source));
            out.policies.push(PolicySnapshot::Deferral(policy));
        }
        Err(e) => {
            ctx.ledger
                .warning(LOCAL_PHASE, format!("deferral probe failed: {e}"));
        }
    }

    match runner.run(&win::agent_probe()).await {
        Ok(values) => {
            let agent = AgentPresence::from_values(&values);
            if agent.is_present() {
                out.evidence.extend(agent_evidence(
                    &agent,
                    &format!("service:{}", win::AGENT_SERVICE_NAME),
                ));
            }
            out.policies.push(PolicySnapshot::Agent(agent));
        }
        Err(e) => {
            ctx.ledger
                .warning(LOCAL_PHASE, format!("agent probe failed: {e}"));
        }
    }

    out
}

/// Remote track: managed-device detail, update-ring configuration,
/// group membership and the bulk export report.
async fn remote_track(
    ctx: &RunContext,
    args: &CollectArgs,
    identity: &DeviceIdentity,
    managed_device_id: &str,
) -> RemoteOutcome {
    let mut out = RemoteOutcome::default();

    if args.skips(SkipCategory::Remote) {
        ctx.ledger.info("remote", "skipped by request");
        return out;
    }

    match ctx
        .gateway
        .get(&format!(
            "deviceManagement/managedDevices/{managed_device_id}\
             ?$select=id,deviceName,operatingSystem,osVersion,managementAgent,complianceState,lastSyncDateTime"
        ))
        .await
    {
        Ok(detail) => out.device_detail = Some(detail),
        Err(e) => {
            ctx.ledger
                .warning("device-detail", format!("managed-device read failed: {e}"));
        }
    }

    match ctx
        .gateway
        .get_all("deviceManagement/deviceConfigurations")
        .await
    {
        Ok(configs) => {
            for config in &configs {
                if !is_update_ring(config) {
                    continue;
                }
                let id = config.get("id").and_then(|v| v.as_str()).unwrap_or("unknown");
                let values = deferral_values_from_ring(config);
                if values.is_empty() {
                    continue;
                }
                let policy = DeferralPolicy::from_values(&values);
                out.evidence.extend(deferral_evidence(
                    &policy,
                    &format!("graph:deviceConfigurations/{id}"),
                ));
                out.policies.push(PolicySnapshot::Deferral(policy));
            }
        }
        Err(e) => {
            ctx.ledger
                .warning("update-rings", format!("configuration read failed: {e}"));
        }
    }

    if args.skips(SkipCategory::Groups) {
        ctx.ledger.info("groups", "skipped by request");
    } else {
        match identity.directory_object_id {
            // Soft dependency: without the directory object id the
            // membership feature is skipped, not failed.
            None => {
                ctx.ledger
                    .warning("groups", "skipped - directory object id unresolved");
            }
            Some(ref object_id) => {
                match ctx
                    .gateway
                    .get_all(&format!(
                        "devices/{}/memberOf?$select=id,displayName",
                        object_id.value
                    ))
                    .await
                {
                    Ok(records) => {
                        let groups = records
                            .iter()
                            .filter_map(|record| {
                                let id = record.get("id")?.as_str()?;
                                let display = record
                                    .get("displayName")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or(id);
                                let name = ctx.cache.insert_if_absent(id, display);
                                Some(GroupMembership {
                                    id: id.to_string(),
                                    name,
                                })
                            })
                            .collect();
                        out.groups = Some(groups);
                    }
                    Err(e) => {
                        ctx.ledger
                            .warning("groups", format!("membership lookup failed: {e}"));
                    }
                }
            }
        }
    }

    if args.skips(SkipCategory::Export) {
        ctx.ledger.info("export", "skipped by request");
    } else if let Err(e) = ctx.gateway.require_scope("Reports.Read.All") {
        ctx.ledger
            .warning("export", format!("skipped - {e}"));
    } else {
        let spec = ExportJobSpec::new("Devices")
            .with_filter(format!("DeviceId eq '{managed_device_id}'"))
            .with_select(&["DeviceId", "DeviceName", "UPN", "OSVersion", "LastCheckIn"]);

        out.export = match run_export_job(&ctx.gateway, &spec, args.max_wait()).await {
            Ok(table) => ExportSection::ok(table),
            Err(e) if e.is_job_timeout() => {
                // Distinct from "no data": the report marks it unknown.
                ctx.ledger
                    .warning("export", format!("{e}; report data unknown"));
                ExportSection::timed_out()
            }
            Err(e) => {
                ctx.ledger.warning("export", format!("export failed: {e}"));
                ExportSection::failed()
            }
        };
    }

    out
}

fn is_update_ring(config: &serde_json::Value) -> bool {
    config
        .get("@odata.type")
        .and_then(|v| v.as_str())
        .is_some_and(|t| t.contains("windowsUpdateForBusinessConfiguration"))
}

/// Normalizes update-ring fields to the registry-style signal names so
/// one policy schema serves both the local and remote track.
fn deferral_values_from_ring(config: &serde_json::Value) -> RawValues {
    const FIELD_MAP: &[(&str, &str)] = &[
        ("deferFeatureUpdatesPeriodInDays", "DeferFeatureUpdatesPeriodInDays"),
        ("deferQualityUpdatesPeriodInDays", "DeferQualityUpdatesPeriodInDays"),
        ("featureUpdatesPauseStartDate", "PauseFeatureUpdatesStartTime"),
        ("qualityUpdatesPauseStartDate", "PauseQualityUpdatesStartTime"),
    ];

    let mut values = RawValues::new();
    for (wire, signal) in FIELD_MAP {
        match config.get(*wire) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => {
                values.insert(*signal, s.clone());
            }
            Some(v) if v.is_number() => values.insert(*signal, v.to_string()),
            _ => {}
        }
    }
    values
}
