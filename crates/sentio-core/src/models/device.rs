use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown> | null"))]
    pub metadata: Option<Map<String, Value>>,
}

impl Device {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind: kind.into(),
            protocol: protocol.into(),
            endpoint: None,
            status: None,
            metadata: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some("online")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DeviceList {
    /// Shown until the inventory has been fetched successfully once.
    pub fn placeholder() -> Self {
        let demo = |id: &str, name: &str, kind: &str, protocol: &str, status: &str| Device {
            id: Some(id.to_string()),
            status: Some(status.to_string()),
            ..Device::new(name, kind, protocol)
        };
        Self {
            devices: vec![
                demo("1", "Temperature Sensor A", "sensor", "zigbee", "online"),
                demo("2", "Pressure Gauge B", "sensor", "modbus", "online"),
                demo("3", "Home Assistant Hub", "gateway", "homeassistant", "online"),
                demo("4", "OPC-UA Server", "plc", "opcua", "offline"),
            ],
        }
    }

    pub fn online_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_online()).count()
    }
}
