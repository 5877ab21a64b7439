//! Session-gated HTTP client with pagination and retry handling.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use patchscope_core::{SessionError, SessionState};

use crate::backoff::Backoff;
use crate::error::{GraphError, GraphResult};

/// `OData` error response from the management API.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
}

/// Response wrapper for paginated management API responses.
#[derive(Debug, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub value: Vec<serde_json::Value>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL for relative request paths.
    pub base_url: String,
    /// Bearer token injected into every request.
    pub access_token: String,
    /// Maximum attempts for retriable failures.
    pub max_attempts: u32,
    /// Delay schedule between retriable attempts.
    pub backoff: Backoff,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            max_attempts: 3,
            backoff: Backoff::transport(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Management API client.
///
/// All remote collection goes through this type. It checks the session
/// before any network I/O, follows continuation links until a result set
/// is complete, and absorbs rate-limit and server-side transient
/// failures up to the attempt budget. It logs every attempt but never
/// writes to the issue ledger; that stays with callers.
#[derive(Debug)]
pub struct Gateway {
    http: reqwest::Client,
    config: GatewayConfig,
    session: Arc<SessionState>,
}

impl Gateway {
    /// Creates a new gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: GatewayConfig, session: Arc<SessionState>) -> GraphResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GraphError::Http)?;

        Ok(Self {
            http,
            config,
            session,
        })
    }

    /// Returns the base URL for relative request paths.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Pre-checks a permission scope before a collection step, without
    /// touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotConnected`] or
    /// [`GraphError::MissingScope`].
    pub fn require_scope(&self, scope: &str) -> GraphResult<()> {
        self.session.require_scope(scope).map_err(|e| match e {
            SessionError::NotConnected => GraphError::NotConnected,
            SessionError::MissingScope { scope } => GraphError::MissingScope { scope },
        })
    }

    fn absolute(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                uri.trim_start_matches('/')
            )
        }
    }

    /// Fetches a single object.
    #[instrument(skip(self))]
    pub async fn get(&self, uri: &str) -> GraphResult<serde_json::Value> {
        let url = self.absolute(uri);
        let response = self.send_with_retry(reqwest::Method::GET, &url, None).await?;
        response.json().await.map_err(GraphError::Http)
    }

    /// Fetches every page of a collection and concatenates the record
    /// sets in fetch order.
    #[instrument(skip(self))]
    pub async fn get_all(&self, uri: &str) -> GraphResult<Vec<serde_json::Value>> {
        let mut url = self.absolute(uri);
        let mut records = Vec::new();

        loop {
            let response = self.send_with_retry(reqwest::Method::GET, &url, None).await?;
            let page: PageEnvelope = response.json().await.map_err(GraphError::Http)?;
            debug!(count = page.value.len(), "fetched page");
            records.extend(page.value);

            match page.next_link {
                Some(next) => url = next,
                None => return Ok(records),
            }
        }
    }

    /// Issues a POST and returns the response object.
    #[instrument(skip(self, body))]
    pub async fn post(
        &self,
        uri: &str,
        body: &serde_json::Value,
    ) -> GraphResult<serde_json::Value> {
        let url = self.absolute(uri);
        let response = self
            .send_with_retry(reqwest::Method::POST, &url, Some(body))
            .await?;
        response.json().await.map_err(GraphError::Http)
    }

    /// Issues a POST to a synchronous report endpoint (filter, select and
    /// limit in the body) and returns the inline record set.
    #[instrument(skip(self, body))]
    pub async fn post_rows(
        &self,
        uri: &str,
        body: &serde_json::Value,
    ) -> GraphResult<Vec<serde_json::Value>> {
        let url = self.absolute(uri);
        let response = self
            .send_with_retry(reqwest::Method::POST, &url, Some(body))
            .await?;
        let envelope: PageEnvelope = response.json().await.map_err(GraphError::Http)?;
        Ok(envelope.value)
    }

    /// Downloads a raw payload (export-job archives).
    #[instrument(skip(self))]
    pub async fn download(&self, uri: &str) -> GraphResult<Vec<u8>> {
        let url = self.absolute(uri);
        let response = self.send_with_retry(reqwest::Method::GET, &url, None).await?;
        let bytes = response.bytes().await.map_err(GraphError::Http)?;
        Ok(bytes.to_vec())
    }

    /// Request loop: session gate, then retry retriable failures on the
    /// configured backoff schedule until success or the attempt budget is
    /// exhausted.
    async fn send_with_retry(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> GraphResult<reqwest::Response> {
        self.session
            .require_connected()
            .map_err(|_| GraphError::NotConnected)?;

        let mut attempts = 0u32;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(&self.config.access_token);
            if let Some(b) = body {
                request = request.json(b);
            }

            let failure = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(%method, url, %status, "request succeeded");
                        return Ok(response);
                    }
                    Self::classify(response).await
                }
                Err(e) => GraphError::Http(e),
            };

            attempts += 1;

            if !failure.is_retriable() {
                debug!(%method, url, error = %failure, "request failed");
                return Err(failure);
            }
            if attempts >= self.config.max_attempts {
                warn!(
                    %method,
                    url,
                    attempts,
                    error = %failure,
                    "max retries exceeded"
                );
                return Err(GraphError::MaxRetriesExceeded {
                    attempts,
                    last: Box::new(failure),
                });
            }

            let delay = match &failure {
                GraphError::Retriable {
                    retry_after_secs: Some(secs),
                    ..
                } => Duration::from_secs(*secs).min(self.config.backoff.cap),
                _ => self.config.backoff.delay_for(attempts - 1),
            };
            debug!(
                %method,
                url,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying after transient error"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Classifies a non-success response into retriable or non-retriable,
    /// decoding the `OData` error body when one is present.
    async fn classify(response: reqwest::Response) -> GraphError {
        let status = response.status();
        let status_code = status.as_u16();

        if status_code == 429 || status.is_server_error() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return GraphError::Retriable {
                status: status_code,
                retry_after_secs,
            };
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(odata) = serde_json::from_str::<ODataError>(&body) {
            return GraphError::NonRetriable {
                status: status_code,
                code: odata.error.code,
                message: odata.error.message,
            };
        }

        GraphError::NonRetriable {
            status: status_code,
            code: status.to_string(),
            message: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_error_parsing() {
        let json = r#"{
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource not found"
            }
        }"#;

        let error: ODataError = serde_json::from_str(json).unwrap();
        assert_eq!(error.error.code, "Request_ResourceNotFound");
        assert_eq!(error.error.message, "Resource not found");
    }

    #[test]
    fn test_page_envelope_parsing() {
        let json = r#"{
            "value": [{"id": "1"}, {"id": "2"}],
            "@odata.nextLink": "https://example.test/v1.0/devices?$skiptoken=xxx"
        }"#;

        let envelope: PageEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.value.len(), 2);
        assert!(envelope.next_link.is_some());
    }

    #[test]
    fn test_page_envelope_missing_value_defaults_empty() {
        let envelope: PageEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.value.is_empty());
        assert!(envelope.next_link.is_none());
    }

    #[test]
    fn test_require_scope_checks_session() {
        let session = Arc::new(SessionState::new());
        session.connect("tenant-test", &["Device.Read.All"]);
        let gateway =
            Gateway::new(GatewayConfig::new("https://example.test", "token"), session).unwrap();

        assert!(gateway.require_scope("Device.Read.All").is_ok());
        assert!(matches!(
            gateway.require_scope("Reports.Read.All"),
            Err(GraphError::MissingScope { .. })
        ));
    }

    #[test]
    fn test_absolute_url_joining() {
        let config = GatewayConfig::new("https://example.test/v1.0/", "token");
        let session = Arc::new(SessionState::new());
        let gateway = Gateway::new(config, session).unwrap();

        assert_eq!(
            gateway.absolute("devices?$top=5"),
            "https://example.test/v1.0/devices?$top=5"
        );
        assert_eq!(
            gateway.absolute("/devices"),
            "https://example.test/v1.0/devices"
        );
        assert_eq!(
            gateway.absolute("https://other.test/next"),
            "https://other.test/next"
        );
    }
}
