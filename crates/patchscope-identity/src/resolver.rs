//! Four-phase identity resolution.

use tracing::{debug, info, instrument};

use patchscope_core::IssueLedger;

use crate::error::IdentityResult;
use crate::model::{DeviceIdentity, DirectoryDevice, IdentityField};
use crate::sources::{DirectorySource, ManagementSource};

/// Ledger phase name for all resolution entries.
const PHASE: &str = "identity";

/// Input to a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    /// Device display name.
    pub device_name: &'a str,
    /// Explicitly supplied hardware id, used to disambiguate duplicate
    /// directory records.
    pub hardware_id: Option<&'a str>,
}

/// Resolves a device name into a [`DeviceIdentity`] bundle.
///
/// Terminates as soon as sufficient identifiers are resolved or all
/// phases are exhausted. The bundle carries whatever subset was
/// resolved; hard/soft classification happens at the caller through
/// [`DeviceIdentity::require_managed_device_id`].
///
/// Directory (general-directory) lookup failures are soft: they are
/// recorded in the ledger and resolution continues, since the directory
/// object id itself is a soft dependency. Management-service lookup
/// failures propagate, because nothing downstream is meaningful without
/// that record.
///
/// # Errors
///
/// Returns an error when a management-service lookup fails.
#[instrument(skip(directory, management, ledger, request), fields(device = %request.device_name))]
pub async fn resolve<D, M>(
    directory: &D,
    management: &M,
    ledger: &IssueLedger,
    request: &ResolveRequest<'_>,
) -> IdentityResult<DeviceIdentity>
where
    D: DirectorySource,
    M: ManagementSource,
{
    let name = request.device_name;

    // Phase 1: general directory by display name.
    let directory_object = match directory.find_by_name(name).await {
        Ok(candidates) => {
            if candidates.len() > 1 {
                ledger.warning(
                    PHASE,
                    format!(
                        "{} directory records match '{name}'; applying tie-break",
                        candidates.len()
                    ),
                );
            }
            select_directory_candidate(candidates, request.hardware_id)
        }
        Err(e) => {
            ledger.warning(PHASE, format!("directory lookup by name failed: {e}"));
            None
        }
    };
    if let Some(ref chosen) = directory_object {
        debug!(object_id = %chosen.object_id, "directory object selected");
    }

    // Hardware id: explicit input wins, then the selected record.
    let mut hardware_id = request
        .hardware_id
        .map(|id| IdentityField::new(id, "supplied as input"))
        .or_else(|| {
            directory_object.as_ref().and_then(|d| {
                d.hardware_id.as_ref().map(|id| {
                    IdentityField::new(id, format!("directory object {}", d.object_id))
                })
            })
        });

    // Phase 2: management service, by hardware id when known.
    let managed = match hardware_id {
        Some(ref hw) => management.find_by_hardware_id(&hw.value).await?,
        None => {
            let mut candidates = management.find_by_name(name).await?;
            if candidates.len() > 1 {
                ledger.warning(
                    PHASE,
                    format!(
                        "{} management-service records match '{name}'; taking first by device id",
                        candidates.len()
                    ),
                );
                candidates.sort_by(|a, b| a.device_id.cmp(&b.device_id));
            }
            candidates.into_iter().next()
        }
    };

    let managed_field = managed.as_ref().map(|m| {
        let provenance = match hardware_id {
            Some(_) => "hardware id match",
            None => "display name match",
        };
        IdentityField::new(&m.device_id, provenance)
    });

    // Recover the hardware id from the management record when the
    // directory did not provide one.
    if hardware_id.is_none() {
        hardware_id = managed.as_ref().and_then(|m| {
            m.hardware_id.as_ref().map(|id| {
                IdentityField::new(id, format!("management record {}", m.device_id))
            })
        });
    }

    // Phase 3: cross-reference recovery of a missing directory object
    // via the hardware id.
    let directory_object = match (directory_object, hardware_id.as_ref()) {
        (None, Some(hw)) => match directory.find_by_hardware_id(&hw.value).await {
            Ok(recovered) => {
                if let Some(ref device) = recovered {
                    info!(object_id = %device.object_id, "directory object recovered by hardware id");
                }
                recovered
            }
            Err(e) => {
                ledger.warning(PHASE, format!("directory lookup by hardware id failed: {e}"));
                None
            }
        },
        (found, _) => found,
    };

    // Phase 4: summary.
    let identity = DeviceIdentity {
        device_name: name.to_string(),
        directory_object_id: directory_object
            .as_ref()
            .map(|d| IdentityField::new(&d.object_id, "directory lookup")),
        hardware_id,
        managed_device_id: managed_field,
    };

    if identity.directory_object_id.is_none() {
        ledger.warning(
            PHASE,
            format!("no directory object resolved for '{name}'; directory-dependent collection will be skipped"),
        );
    }
    match identity.managed_device_id {
        Some(ref field) => info!(managed_device_id = %field.value, "identity resolved"),
        None => ledger.error(
            PHASE,
            format!("no management-service record resolved for '{name}'"),
        ),
    }

    Ok(identity)
}

/// Deterministic, total tie-break over directory candidates:
///
/// 1. exact hardware-id match when an explicit id was supplied,
/// 2. an object flagged as currently managed,
/// 3. the most recent last-seen timestamp,
/// 4. lowest object id, as a final total ordering.
fn select_directory_candidate(
    mut candidates: Vec<DirectoryDevice>,
    explicit_hardware_id: Option<&str>,
) -> Option<DirectoryDevice> {
    if candidates.len() <= 1 {
        return candidates.pop();
    }

    if let Some(hw) = explicit_hardware_id {
        if let Some(exact) = candidates
            .iter()
            .find(|c| c.hardware_id.as_deref() == Some(hw))
        {
            return Some(exact.clone());
        }
    }

    candidates.sort_by(|a, b| {
        b.is_managed
            .cmp(&a.is_managed)
            .then_with(|| b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.object_id.cmp(&b.object_id))
    });
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(object_id: &str, managed: bool, last_seen: Option<&str>) -> DirectoryDevice {
        DirectoryDevice {
            object_id: object_id.to_string(),
            display_name: "PC001".to_string(),
            hardware_id: None,
            is_managed: managed,
            last_seen: last_seen.map(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
        }
    }

    #[test]
    fn test_tie_break_prefers_managed() {
        // A1 unmanaged but recently seen, A2 managed but stale: the
        // managed record wins.
        let chosen = select_directory_candidate(
            vec![
                candidate("A1", false, Some("2024-01-01T00:00:00Z")),
                candidate("A2", true, Some("2023-06-01T00:00:00Z")),
            ],
            None,
        )
        .unwrap();
        assert_eq!(chosen.object_id, "A2");
    }

    #[test]
    fn test_tie_break_explicit_hardware_id_wins() {
        let mut stale = candidate("A1", false, None);
        stale.hardware_id = Some("hw-1".to_string());
        let managed = candidate("A2", true, Some("2024-01-01T00:00:00Z"));

        let chosen = select_directory_candidate(vec![stale, managed], Some("hw-1")).unwrap();
        assert_eq!(chosen.object_id, "A1");
    }

    #[test]
    fn test_tie_break_most_recent_last_seen() {
        let chosen = select_directory_candidate(
            vec![
                candidate("A1", false, Some("2023-01-01T00:00:00Z")),
                candidate("A2", false, Some("2024-01-01T00:00:00Z")),
                candidate("A3", false, None),
            ],
            None,
        )
        .unwrap();
        assert_eq!(chosen.object_id, "A2");
    }

    #[test]
    fn test_tie_break_is_total() {
        // Identical records apart from object id: still exactly one
        // deterministic winner.
        let chosen = select_directory_candidate(
            vec![candidate("B2", false, None), candidate("B1", false, None)],
            None,
        )
        .unwrap();
        assert_eq!(chosen.object_id, "B1");
    }

    #[test]
    fn test_empty_candidates_yield_none() {
        assert!(select_directory_candidate(Vec::new(), None).is_none());
    }

    #[test]
    fn test_single_candidate_taken_directly() {
        let only = candidate("A1", false, None);
        let chosen = select_directory_candidate(vec![only.clone()], None).unwrap();
        assert_eq!(chosen, only);
    }

    #[test]
    fn test_timestamp_ordering_sanity() {
        let older = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(Some(newer) > Some(older));
        assert!(Some(older) > None);
    }
}
