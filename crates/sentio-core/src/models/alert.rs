use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AlertRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Firing state, reported by the backend only.
    #[serde(default, skip_serializing)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub timestamp: Option<String>,
}

fn default_severity() -> String {
    "warning".to_string()
}

fn default_enabled() -> bool {
    true
}

impl AlertRule {
    pub fn new(name: impl Into<String>, query: impl Into<String>, threshold: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            query: query.into(),
            threshold,
            severity: default_severity(),
            enabled: true,
            status: None,
            timestamp: None,
        }
    }

    pub fn is_firing(&self) -> bool {
        self.status.as_deref() == Some("firing")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AlertList {
    #[serde(default)]
    pub alerts: Vec<AlertRule>,
}

impl AlertList {
    /// Shown until the alert rules have been fetched successfully once.
    pub fn placeholder() -> Self {
        let demo = |id: &str, name: &str, severity: &str, status: &str| AlertRule {
            id: Some(id.to_string()),
            severity: severity.to_string(),
            status: Some(status.to_string()),
            ..AlertRule::new(name, "", 0.0)
        };
        Self {
            alerts: vec![
                demo("1", "High CPU Usage", "high", "firing"),
                demo("2", "Disk Space Low", "medium", "firing"),
                demo("3", "Network Latency", "low", "resolved"),
            ],
        }
    }

    pub fn firing(&self) -> impl Iterator<Item = &AlertRule> {
        self.alerts.iter().filter(|a| a.is_firing())
    }
}
