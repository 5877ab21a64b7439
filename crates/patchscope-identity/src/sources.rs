//! Directory source traits and their management-API implementations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use patchscope_graph::Gateway;

use crate::error::IdentityResult;
use crate::model::{DirectoryDevice, ManagedDevice};

/// Fields selected from directory device objects.
const DIRECTORY_SELECT_FIELDS: &str = "id,displayName,deviceId,isManaged,approximateLastSignInDateTime";

/// Fields selected from management-service device records.
const MANAGED_SELECT_FIELDS: &str = "id,deviceName,azureADDeviceId";

/// Lookup surface of the general directory service.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Devices whose display name matches exactly. Duplicates and stale
    /// records are expected.
    async fn find_by_name(&self, name: &str) -> IdentityResult<Vec<DirectoryDevice>>;

    /// Device by the stable hardware id, used as a secondary key.
    async fn find_by_hardware_id(&self, hardware_id: &str)
        -> IdentityResult<Option<DirectoryDevice>>;
}

/// Lookup surface of the device-management service.
#[async_trait]
pub trait ManagementSource: Send + Sync {
    async fn find_by_hardware_id(&self, hardware_id: &str)
        -> IdentityResult<Option<ManagedDevice>>;

    async fn find_by_name(&self, name: &str) -> IdentityResult<Vec<ManagedDevice>>;
}

fn eq_filter(field: &str, value: &str) -> String {
    // Single quotes inside the value are doubled per OData literal rules.
    let escaped = value.replace('\'', "''");
    urlencoding::encode(&format!("{field} eq '{escaped}'")).into_owned()
}

/// Directory lookups over the management API.
#[derive(Debug, Clone)]
pub struct GraphDirectory {
    gateway: Arc<Gateway>,
}

impl GraphDirectory {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    fn map_records(records: Vec<serde_json::Value>) -> Vec<DirectoryDevice> {
        records
            .iter()
            .filter_map(|value| match DirectoryDevice::from_json(value) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("skipping malformed directory record: {e}");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl DirectorySource for GraphDirectory {
    async fn find_by_name(&self, name: &str) -> IdentityResult<Vec<DirectoryDevice>> {
        let uri = format!(
            "devices?$filter={}&$select={}",
            eq_filter("displayName", name),
            DIRECTORY_SELECT_FIELDS
        );
        Ok(Self::map_records(self.gateway.get_all(&uri).await?))
    }

    async fn find_by_hardware_id(
        &self,
        hardware_id: &str,
    ) -> IdentityResult<Option<DirectoryDevice>> {
        let uri = format!(
            "devices?$filter={}&$select={}",
            eq_filter("deviceId", hardware_id),
            DIRECTORY_SELECT_FIELDS
        );
        Ok(Self::map_records(self.gateway.get_all(&uri).await?)
            .into_iter()
            .next())
    }
}

/// Management-service lookups over the management API.
#[derive(Debug, Clone)]
pub struct GraphManagement {
    gateway: Arc<Gateway>,
}

impl GraphManagement {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    fn map_records(records: Vec<serde_json::Value>) -> Vec<ManagedDevice> {
        records
            .iter()
            .filter_map(|value| match ManagedDevice::from_json(value) {
                Ok(device) => Some(device),
                Err(e) => {
                    warn!("skipping malformed managed-device record: {e}");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl ManagementSource for GraphManagement {
    async fn find_by_hardware_id(
        &self,
        hardware_id: &str,
    ) -> IdentityResult<Option<ManagedDevice>> {
        let uri = format!(
            "deviceManagement/managedDevices?$filter={}&$select={}",
            eq_filter("azureADDeviceId", hardware_id),
            MANAGED_SELECT_FIELDS
        );
        Ok(Self::map_records(self.gateway.get_all(&uri).await?)
            .into_iter()
            .next())
    }

    async fn find_by_name(&self, name: &str) -> IdentityResult<Vec<ManagedDevice>> {
        let uri = format!(
            "deviceManagement/managedDevices?$filter={}&$select={}",
            eq_filter("deviceName", name),
            MANAGED_SELECT_FIELDS
        );
        Ok(Self::map_records(self.gateway.get_all(&uri).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_filter_encoding() {
        assert_eq!(
            eq_filter("displayName", "PC001"),
            "displayName%20eq%20%27PC001%27"
        );
    }

    #[test]
    fn test_eq_filter_escapes_quotes() {
        let encoded = eq_filter("displayName", "O'Brien-PC");
        let decoded = urlencoding::decode(&encoded).unwrap();
        assert_eq!(decoded, "displayName eq 'O''Brien-PC'");
    }
}
