use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    DecodeError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// The backend reports failures as `{"detail": "..."}`; fall back to the raw body.
    fn message_from_body(status: reqwest::StatusCode, body: &str) -> String {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| match v.get("detail") {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
                None => None,
            });

        match detail {
            Some(detail) => Self::truncate_body(&detail),
            None if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string(),
            None => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::message_from_body(status, body);
        let code = status.as_u16();
        match code {
            401 | 403 => ApiError::Unauthorized { status: code, message },
            500..=599 => ApiError::ServerError { status: code, message },
            _ => ApiError::ClientError { status: code, message },
        }
    }

    /// Classify a reqwest failure that happened before a status was available.
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout)
        } else if err.is_decode() {
            ApiError::DecodeError(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::NetworkUnavailable(err.to_string())
        }
    }

    /// HTTP status code carried by the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. }
            | ApiError::ClientError { status, .. }
            | ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// A 401 means the presented credential is no longer accepted.
    /// A 403 is an authenticated request that lacks permission.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, ApiError::Unauthorized { status: 401, .. })
    }
}
