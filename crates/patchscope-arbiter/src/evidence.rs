//! Candidate authorities and the evidence records feeding arbitration.

use serde::Serialize;

/// Candidate management authorities, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Authority {
    /// Client-side management agent.
    Sccm,
    /// Cloud endpoint-update service.
    Esus,
    /// Mobile-device-management deferral policy.
    Wufb,
    /// On-premises update server.
    Wsus,
    /// No authority detected.
    Unmanaged,
}

impl Authority {
    /// Display label used in reports.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Authority::Sccm => "SCCM",
            Authority::Esus => "Intune (ESUS)",
            Authority::Wufb => "WUFB",
            Authority::Wsus => "WSUS",
            Authority::Unmanaged => "Unmanaged",
        }
    }
}

impl std::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One observed fact used as arbitration input, distinct from the
/// decision itself. Collected once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// Candidate authority this signal argues for.
    pub authority: Authority,
    /// Signal name, e.g. a registry-style value name or service name.
    pub signal: String,
    /// Observed value.
    pub value: String,
    /// Where the signal was observed (path, namespace, endpoint).
    pub source: String,
    /// Informational weight: drives display and debug ordering, not the
    /// arbitration decision.
    pub weight: u32,
    /// Free-text note.
    pub note: Option<String>,
}

impl Evidence {
    #[must_use]
    pub fn new(
        authority: Authority,
        signal: impl Into<String>,
        value: impl Into<String>,
        source: impl Into<String>,
        weight: u32,
    ) -> Self {
        Self {
            authority,
            signal: signal.into(),
            value: value.into(),
            source: source.into(),
            weight,
            note: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Whether the observed value represents a set/enabled signal.
    ///
    /// Registry-style values report "1"/"0" or "true"/"false"; an empty
    /// string means the value was absent.
    #[must_use]
    pub fn is_set(&self) -> bool {
        let v = self.value.trim();
        !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Authority::Sccm.label(), "SCCM");
        assert_eq!(Authority::Esus.label(), "Intune (ESUS)");
        assert_eq!(Authority::Wufb.to_string(), "WUFB");
    }

    #[test]
    fn test_is_set() {
        let set = Evidence::new(Authority::Wufb, "DeferQualityUpdates", "1", "policy", 10);
        assert!(set.is_set());

        let zero = Evidence::new(Authority::Wufb, "DeferQualityUpdates", "0", "policy", 10);
        assert!(!zero.is_set());

        let empty = Evidence::new(Authority::Wufb, "DeferQualityUpdates", "", "policy", 10);
        assert!(!empty.is_set());

        let false_str = Evidence::new(Authority::Wufb, "DeferQualityUpdates", "False", "policy", 10);
        assert!(!false_str.is_set());
    }
}
