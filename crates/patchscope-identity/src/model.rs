//! Device records and the resolved identity bundle.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{IdentityError, IdentityResult};

/// A device record in the general directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryDevice {
    /// Directory object id.
    pub object_id: String,
    pub display_name: String,
    /// Stable hardware id shared with the management service.
    pub hardware_id: Option<String>,
    /// Whether the directory flags the object as currently managed.
    pub is_managed: bool,
    /// Most recent sign-in observed for the object.
    pub last_seen: Option<DateTime<Utc>>,
}

impl DirectoryDevice {
    /// Parses a device from the directory JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Malformed`] if the object id is missing.
    pub fn from_json(value: &serde_json::Value) -> IdentityResult<Self> {
        Ok(Self {
            object_id: value
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| IdentityError::Malformed("missing directory object id".into()))?
                .to_string(),
            display_name: value
                .get("displayName")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            hardware_id: value
                .get("deviceId")
                .and_then(|v| v.as_str())
                .map(String::from),
            is_managed: value
                .get("isManaged")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            last_seen: value
                .get("approximateLastSignInDateTime")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

/// A device record in the management service.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedDevice {
    /// Management-service device id.
    pub device_id: String,
    pub display_name: String,
    /// Stable hardware id shared with the general directory.
    pub hardware_id: Option<String>,
}

impl ManagedDevice {
    /// Parses a device from the management-service JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Malformed`] if the device id is missing.
    pub fn from_json(value: &serde_json::Value) -> IdentityResult<Self> {
        Ok(Self {
            device_id: value
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| IdentityError::Malformed("missing managed device id".into()))?
                .to_string(),
            display_name: value
                .get("deviceName")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            hardware_id: value
                .get("azureADDeviceId")
                .and_then(|v| v.as_str())
                .map(String::from),
        })
    }
}

/// A resolved identifier together with how it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityField {
    pub value: String,
    /// Free-form provenance note, e.g. which phase and record produced
    /// the value.
    pub provenance: String,
}

impl IdentityField {
    #[must_use]
    pub fn new(value: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            provenance: provenance.into(),
        }
    }
}

/// Canonical cross-referenced identifiers for one device.
///
/// Mutated only during resolution; read-only for the rest of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Display name the resolution started from.
    pub device_name: String,
    /// General-directory object id. Absence is a soft failure: features
    /// that depend on it are skipped and logged.
    pub directory_object_id: Option<IdentityField>,
    /// Stable hardware id shared between the directories.
    pub hardware_id: Option<IdentityField>,
    /// Management-service device id. Absence is a hard failure for any
    /// caller that needs it.
    pub managed_device_id: Option<IdentityField>,
}

impl DeviceIdentity {
    /// The managed-device id, or [`IdentityError::Unresolved`].
    ///
    /// # Errors
    ///
    /// Returns a hard error when the management-service record was not
    /// resolved.
    pub fn require_managed_device_id(&self) -> IdentityResult<&str> {
        self.managed_device_id
            .as_ref()
            .map(|f| f.value.as_str())
            .ok_or_else(|| {
                IdentityError::unresolved(&self.device_name, "no management-service record found")
            })
    }

    /// Whether resolution left gaps. Partial identity is soft: callers
    /// log it and continue with reduced data.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.directory_object_id.is_none()
            || self.hardware_id.is_none()
            || self.managed_device_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_device_from_json_complete() {
        let json = serde_json::json!({
            "id": "obj-1",
            "displayName": "PC001",
            "deviceId": "hw-guid-1",
            "isManaged": true,
            "approximateLastSignInDateTime": "2024-01-01T08:00:00Z"
        });

        let device = DirectoryDevice::from_json(&json).unwrap();
        assert_eq!(device.object_id, "obj-1");
        assert_eq!(device.display_name, "PC001");
        assert_eq!(device.hardware_id.as_deref(), Some("hw-guid-1"));
        assert!(device.is_managed);
        assert!(device.last_seen.is_some());
    }

    #[test]
    fn test_directory_device_from_json_minimal() {
        let device = DirectoryDevice::from_json(&serde_json::json!({"id": "obj-1"})).unwrap();
        assert_eq!(device.object_id, "obj-1");
        assert!(device.hardware_id.is_none());
        assert!(!device.is_managed);
        assert!(device.last_seen.is_none());
    }

    #[test]
    fn test_directory_device_missing_id_is_malformed() {
        let err = DirectoryDevice::from_json(&serde_json::json!({"displayName": "PC001"}))
            .unwrap_err();
        assert!(matches!(err, IdentityError::Malformed(_)));
    }

    #[test]
    fn test_managed_device_from_json() {
        let json = serde_json::json!({
            "id": "md-1",
            "deviceName": "PC001",
            "azureADDeviceId": "hw-guid-1"
        });

        let device = ManagedDevice::from_json(&json).unwrap();
        assert_eq!(device.device_id, "md-1");
        assert_eq!(device.hardware_id.as_deref(), Some("hw-guid-1"));
    }

    #[test]
    fn test_require_managed_device_id() {
        let mut identity = DeviceIdentity {
            device_name: "PC001".into(),
            ..DeviceIdentity::default()
        };
        assert!(identity.require_managed_device_id().unwrap_err().is_hard());

        identity.managed_device_id = Some(IdentityField::new("md-1", "hardware id match"));
        assert_eq!(identity.require_managed_device_id().unwrap(), "md-1");
        // Still partial: the directory object and hardware id are gaps.
        assert!(identity.is_partial());
    }
}
