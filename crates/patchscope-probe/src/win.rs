//! Built-in probes for Windows update-management configuration.
//!
//! Each probe is a PowerShell snippet that emits `name=value` lines, so
//! the same [`ProbeSpec`](crate::ProbeSpec) runs unchanged against the
//! local machine or, wrapped by the remote runner, a named remote
//! machine.

use crate::target::ProbeSpec;

/// Policy path carrying the update-server assignment.
pub const UPDATE_POLICY_PATH: &str = r"HKLM:\SOFTWARE\Policies\Microsoft\Windows\WindowsUpdate";

/// Agent service probed for client-side management.
pub const AGENT_SERVICE_NAME: &str = "CcmExec";

/// Agent instrumentation namespace.
pub const AGENT_NAMESPACE: &str = r"root\ccm";

fn powershell(name: &str, script: &str) -> ProbeSpec {
    ProbeSpec::new(
        name,
        "powershell",
        vec![
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-Command".to_string(),
            script.to_string(),
        ],
    )
}

/// Update-server assignment: `WUServer`, `WUStatusServer` and the
/// `UseWUServer` flag from the AU subkey.
#[must_use]
pub fn update_server_probe() -> ProbeSpec {
    let script = format!(
        "$p = Get-ItemProperty -Path '{path}' -ErrorAction SilentlyContinue; \
         if ($p) {{ foreach ($n in 'WUServer','WUStatusServer') {{ \
           if ($null -ne $p.$n) {{ \"$n=$($p.$n)\" }} }} }}; \
         $au = Get-ItemProperty -Path '{path}\\AU' -ErrorAction SilentlyContinue; \
         if ($au -and $null -ne $au.UseWUServer) {{ \"UseWUServer=$($au.UseWUServer)\" }}",
        path = UPDATE_POLICY_PATH
    );
    powershell("update-server", &script)
}

/// Deferral and pause configuration from the update policy key.
#[must_use]
pub fn deferral_probe() -> ProbeSpec {
    let script = format!(
        "$p = Get-ItemProperty -Path '{path}' -ErrorAction SilentlyContinue; \
         if ($p) {{ foreach ($n in 'DeferFeatureUpdates','DeferFeatureUpdatesPeriodInDays',\
'DeferQualityUpdates','DeferQualityUpdatesPeriodInDays',\
'PauseFeatureUpdatesStartTime','PauseQualityUpdatesStartTime') {{ \
           if ($null -ne $p.$n) {{ \"$n=$($p.$n)\" }} }} }}",
        path = UPDATE_POLICY_PATH
    );
    powershell("deferral-policy", &script)
}

/// Client-side agent presence: the agent service and its namespace.
#[must_use]
pub fn agent_probe() -> ProbeSpec {
    let script = format!(
        "$svc = Get-Service -Name '{service}' -ErrorAction SilentlyContinue; \
         if ($svc) {{ \"AgentService=$($svc.Name)\" }}; \
         $ns = Get-CimInstance -Namespace '{namespace}' -ClassName SMS_Client -ErrorAction SilentlyContinue; \
         if ($ns) {{ \"AgentNamespace={namespace}\" }}",
        service = AGENT_SERVICE_NAME,
        namespace = AGENT_NAMESPACE
    );
    powershell("agent-presence", &script)
}
