//! Probe targets, specifications and runners.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{ProbeError, ProbeResult};

/// Where a probe runs: the current machine or a named remote machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Local,
    Remote(String),
}

impl ProbeTarget {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, ProbeTarget::Local)
    }
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeTarget::Local => f.write_str("localhost"),
            ProbeTarget::Remote(host) => f.write_str(host),
        }
    }
}

/// A single named probe: a command whose stdout is a `name=value`
/// listing.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Per-probe timeout; exceeding it fails this probe only.
    pub timeout: Duration,
}

impl ProbeSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Ordered key/value output of one probe execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawValues(BTreeMap<String, String>);

impl RawValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `name=value` lines. Blank lines and lines without a `=`
    /// separator are skipped; values keep any embedded `=`.
    #[must_use]
    pub fn parse(stdout: &str) -> Self {
        let mut values = BTreeMap::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((name, value)) = line.split_once('=') {
                values.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
        Self(values)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Removes and returns a value, used by typed parsers to drain known
    /// keys before collecting the rest.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Executes probes against a target.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    /// Runs the probe and parses its output.
    async fn run(&self, spec: &ProbeSpec) -> ProbeResult<RawValues>;

    /// The target this runner executes against.
    fn target(&self) -> &ProbeTarget;
}

/// Process-based runner. For a remote target the same command is
/// wrapped in a remote invocation rather than duplicated.
#[derive(Debug, Clone)]
pub struct ExecRunner {
    target: ProbeTarget,
}

impl ExecRunner {
    #[must_use]
    pub fn local() -> Self {
        Self {
            target: ProbeTarget::Local,
        }
    }

    #[must_use]
    pub fn remote(host: impl Into<String>) -> Self {
        Self {
            target: ProbeTarget::Remote(host.into()),
        }
    }

    /// The concrete command line for this target.
    fn build_command(&self, spec: &ProbeSpec) -> (String, Vec<String>) {
        match &self.target {
            ProbeTarget::Local => (spec.program.clone(), spec.args.clone()),
            ProbeTarget::Remote(host) => {
                let inner = std::iter::once(spec.program.as_str())
                    .chain(spec.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ");
                (
                    "powershell".to_string(),
                    vec![
                        "-NoProfile".to_string(),
                        "-NonInteractive".to_string(),
                        "-Command".to_string(),
                        format!("Invoke-Command -ComputerName {host} -ScriptBlock {{ {inner} }}"),
                    ],
                )
            }
        }
    }
}

#[async_trait]
impl ProbeRunner for ExecRunner {
    #[instrument(skip(self, spec), fields(probe = %spec.name, target = %self.target))]
    async fn run(&self, spec: &ProbeSpec) -> ProbeResult<RawValues> {
        let (program, args) = self.build_command(spec);

        let output = tokio::time::timeout(
            spec.timeout,
            Command::new(&program).args(&args).output(),
        )
        .await
        .map_err(|_| ProbeError::Timeout {
            name: spec.name.clone(),
            secs: spec.timeout.as_secs(),
        })?
        .map_err(|source| ProbeError::Launch {
            name: spec.name.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                name: spec.name.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let values = RawValues::parse(&String::from_utf8_lossy(&output.stdout));
        debug!(values = values.len(), "probe completed");
        Ok(values)
    }

    fn target(&self) -> &ProbeTarget {
        &self.target
    }
}
