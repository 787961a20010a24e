//! Typed request and response bodies for the Sentio API.
//!
//! Payloads the console only passes through (metric ranges, log streams,
//! trace spans) stay as `serde_json::Value`; the rest are modelled here.
//! With the `ts` feature enabled each type also derives `ts_rs::TS` so the
//! browser front-end can share them.

pub mod ai;
pub mod alert;
pub mod auth;
pub mod device;
pub mod status;
pub mod telemetry;

pub use ai::{Anomaly, AnomalyList, Prediction, PredictionList};
pub use alert::{AlertList, AlertRule};
pub use auth::{LoginRequest, TokenResponse};
pub use device::{Device, DeviceList};
pub use status::SystemStatus;
pub use telemetry::{LogsQuery, MetricsQuery, TracesQuery};

use serde::{Deserialize, Serialize};

/// Acknowledgement returned by DELETE endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Deleted {
    pub status: String,
    pub id: String,
}
