use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aggregated component health from `GET /status`.
///
/// `components` keeps the backend's key order and values verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SystemStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub components: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl SystemStatus {
    /// Components whose reported value is anything other than `"healthy"`.
    pub fn unhealthy(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, v)| v.as_str() != Some("healthy"))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
