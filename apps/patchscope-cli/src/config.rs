//! Runtime configuration, sourced from flags and the environment.

use crate::error::{CliError, CliResult};

/// Environment variable carrying the management API base URL.
const ENV_API_URL: &str = "PATCHSCOPE_API_URL";

/// Environment variable carrying the bearer token. Token acquisition is
/// outside this tool; an orchestrating script supplies one.
const ENV_TOKEN: &str = "PATCHSCOPE_TOKEN";

/// Environment variable carrying the tenant identifier.
const ENV_TENANT: &str = "PATCHSCOPE_TENANT";

const DEFAULT_API_URL: &str = "https://graph.microsoft.com/v1.0";

/// Permission scopes the collection run relies on.
pub const REQUIRED_SCOPES: &[&str] = &[
    "Device.Read.All",
    "DeviceManagementManagedDevices.Read.All",
    "DeviceManagementConfiguration.Read.All",
    "Reports.Read.All",
];

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub access_token: String,
    pub tenant_id: String,
}

impl AppConfig {
    /// Loads configuration, preferring the `--tenant` flag over the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the token or tenant is missing.
    pub fn load(tenant_flag: Option<String>) -> CliResult<Self> {
        let api_url =
            std::env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let access_token = std::env::var(ENV_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                CliError::Config(format!("no access token; set {ENV_TOKEN}"))
            })?;

        let tenant_id = tenant_flag
            .or_else(|| std::env::var(ENV_TENANT).ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                CliError::Config(format!("no tenant id; pass --tenant or set {ENV_TENANT}"))
            })?;

        Ok(Self {
            api_url,
            access_token,
            tenant_id,
        })
    }
}
