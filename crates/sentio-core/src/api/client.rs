//! API client for the Sentio backend.
//!
//! `ApiClient` resolves every path against one base URL, attaches the
//! current session token as a bearer credential, and turns every failure
//! into an [`ApiError`]. It never retries; refresh policy lives in the
//! query cache.

use std::time::Duration;

use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::models::{
    AlertList, AlertRule, AnomalyList, Deleted, Device, DeviceList, LoginRequest, LogsQuery,
    MetricsQuery, PredictionList, SystemStatus, TokenResponse, TracesQuery,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/auth/login";
const METRICS_QUERY_PATH: &str = "/metrics/query";
const METRICS_SERIES_PATH: &str = "/metrics/series";
const LOGS_QUERY_PATH: &str = "/logs/query";
const LOGS_LABELS_PATH: &str = "/logs/labels";
const TRACES_QUERY_PATH: &str = "/traces/query";
const TRACES_PATH: &str = "/traces";
const DEVICES_PATH: &str = "/devices";
const ALERTS_PATH: &str = "/alerts";
const ANOMALIES_PATH: &str = "/ai/anomalies";
const PREDICTIONS_PATH: &str = "/ai/predictions";
const STATUS_PATH: &str = "/status";

/// A fully resolved outbound request. Built fresh for every call from the
/// logical API call plus the session token current at that moment.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    pub path: String,
    pub url: String,
    pub body: Option<Value>,
    pub headers: header::HeaderMap,
    token: Option<String>,
}

impl RequestEnvelope {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Authenticated transport for the Sentio API.
/// Clone is cheap - reqwest::Client and the credential store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: CredentialStore,
    timeout: Duration,
    clear_on_unauthorized: bool,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: &str, credentials: CredentialStore) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            credentials,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: CredentialStore,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("base URL {:?}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidRequest(format!(
                "base URL {:?} must be http or https",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            timeout,
            clear_on_unauthorized: true,
        })
    }

    pub fn from_config(config: &Config, credentials: CredentialStore) -> Result<Self, ApiError> {
        let mut client = Self::with_timeout(&config.api_url, credentials, config.request_timeout())?;
        client.clear_on_unauthorized = config.logout_on_unauthorized;
        Ok(client)
    }

    /// Whether a 401 on an authenticated request clears the session.
    pub fn clear_session_on_unauthorized(mut self, enabled: bool) -> Self {
        self.clear_on_unauthorized = enabled;
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build the envelope for a call, attaching the current token if any.
    pub fn envelope(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<RequestEnvelope, ApiError> {
        self.build_envelope(method, path, body, self.credentials.get())
    }

    fn build_envelope(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<String>,
    ) -> Result<RequestEnvelope, ApiError> {
        let mut headers = header::HeaderMap::new();
        if body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
        }
        if let Some(ref token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("session token is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        Ok(RequestEnvelope {
            url: self.url(path),
            path: path.to_string(),
            method,
            body,
            headers,
            token,
        })
    }

    /// Perform an authenticated call and return the JSON payload.
    /// An empty success body yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let envelope = self.envelope(method, path, body.cloned())?;
        self.execute(envelope).await
    }

    async fn execute(&self, envelope: RequestEnvelope) -> Result<Value, ApiError> {
        debug!(method = %envelope.method, path = %envelope.path, "Sending request");

        let mut request = self
            .client
            .request(envelope.method.clone(), &envelope.url)
            .headers(envelope.headers.clone());
        if let Some(ref body) = envelope.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = ApiError::from_transport(&e, self.timeout);
            warn!(path = %envelope.path, error = %err, "Request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body);
            warn!(path = %envelope.path, status = status.as_u16(), error = %err, "Request rejected");
            if err.is_session_rejected() {
                self.reject_session(&envelope);
            }
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e, self.timeout))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::DecodeError(format!("{} {}: {}", envelope.method, envelope.path, e))
        })
    }

    /// Treat a 401 as an implicit logout, but only when the rejected token is
    /// still the current one; a newer login must not be undone by a late reply.
    fn reject_session(&self, envelope: &RequestEnvelope) {
        if !self.clear_on_unauthorized {
            return;
        }
        let Some(ref sent) = envelope.token else {
            return;
        };
        if self.credentials.get().as_deref() == Some(sent.as_str()) {
            info!(path = %envelope.path, "Session rejected by server, signing out");
            if let Err(e) = self.credentials.clear() {
                warn!(error = %e, "Failed to remove persisted session");
            }
        }
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let envelope = self.envelope(method, path, body)?;
        let value = self.execute(envelope).await?;
        Self::decode(path, value)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::DELETE, path, None).await
    }

    fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
        serde_json::from_value(value)
            .map_err(|e| ApiError::DecodeError(format!("{}: {}", path, e)))
    }

    /// Join an opaque identifier onto a collection path.
    fn item_path(collection: &str, id: &str) -> Result<String, ApiError> {
        if id.is_empty() || id.contains(|c| matches!(c, '/' | '?' | '#')) {
            return Err(ApiError::InvalidRequest(format!("invalid identifier {:?}", id)));
        }
        Ok(format!("{}/{}", collection, id))
    }

    // ===== Authentication =====

    /// Exchange credentials for a session token. Never sends the current
    /// token and never clears the session on rejection.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let body = serde_json::to_value(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let envelope = self.build_envelope(Method::POST, LOGIN_PATH, Some(body), None)?;
        let value = self.execute(envelope).await?;
        Self::decode(LOGIN_PATH, value)
    }

    // ===== Metrics =====

    pub async fn query_metrics(&self, query: &MetricsQuery) -> Result<Value, ApiError> {
        self.post(METRICS_QUERY_PATH, query).await
    }

    pub async fn list_metric_series(&self) -> Result<Value, ApiError> {
        self.get(METRICS_SERIES_PATH).await
    }

    // ===== Logs =====

    pub async fn query_logs(&self, query: &LogsQuery) -> Result<Value, ApiError> {
        self.post(LOGS_QUERY_PATH, query).await
    }

    pub async fn list_log_labels(&self) -> Result<Value, ApiError> {
        self.get(LOGS_LABELS_PATH).await
    }

    // ===== Traces =====

    pub async fn query_traces(&self, query: &TracesQuery) -> Result<Value, ApiError> {
        self.post(TRACES_QUERY_PATH, query).await
    }

    pub async fn get_trace(&self, trace_id: &str) -> Result<Value, ApiError> {
        self.get(&Self::item_path(TRACES_PATH, trace_id)?).await
    }

    // ===== Devices =====

    pub async fn list_devices(&self) -> Result<DeviceList, ApiError> {
        self.get(DEVICES_PATH).await
    }

    pub async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
        self.get(&Self::item_path(DEVICES_PATH, id)?).await
    }

    pub async fn create_device(&self, device: &Device) -> Result<Device, ApiError> {
        self.post(DEVICES_PATH, device).await
    }

    pub async fn update_device(&self, id: &str, device: &Device) -> Result<Device, ApiError> {
        self.put(&Self::item_path(DEVICES_PATH, id)?, device).await
    }

    pub async fn delete_device(&self, id: &str) -> Result<Deleted, ApiError> {
        self.delete(&Self::item_path(DEVICES_PATH, id)?).await
    }

    // ===== Alerts =====

    pub async fn list_alerts(&self) -> Result<AlertList, ApiError> {
        self.get(ALERTS_PATH).await
    }

    pub async fn get_alert(&self, id: &str) -> Result<AlertRule, ApiError> {
        self.get(&Self::item_path(ALERTS_PATH, id)?).await
    }

    pub async fn create_alert(&self, alert: &AlertRule) -> Result<AlertRule, ApiError> {
        self.post(ALERTS_PATH, alert).await
    }

    pub async fn update_alert(&self, id: &str, alert: &AlertRule) -> Result<AlertRule, ApiError> {
        self.put(&Self::item_path(ALERTS_PATH, id)?, alert).await
    }

    pub async fn delete_alert(&self, id: &str) -> Result<Deleted, ApiError> {
        self.delete(&Self::item_path(ALERTS_PATH, id)?).await
    }

    // ===== AI insights =====

    pub async fn anomalies(&self) -> Result<AnomalyList, ApiError> {
        self.get(ANOMALIES_PATH).await
    }

    pub async fn predictions(&self) -> Result<PredictionList, ApiError> {
        self.get(PREDICTIONS_PATH).await
    }

    // ===== Platform status =====

    pub async fn status(&self) -> Result<SystemStatus, ApiError> {
        self.get(STATUS_PATH).await
    }
}
