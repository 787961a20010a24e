use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A point the anomaly detector flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Anomaly {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default = "unknown_metric")]
    pub metric: String,
}

fn unknown_metric() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AnomalyList {
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
}

/// Failure-risk estimate for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Prediction {
    pub device_id: String,
    pub risk_level: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub estimated_time_to_failure: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub indicators: Map<String, Value>,
}

impl Prediction {
    pub fn is_high_risk(&self) -> bool {
        self.risk_level == "high"
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PredictionList {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl PredictionList {
    pub fn high_risk_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_high_risk()).count()
    }
}
