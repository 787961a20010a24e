//! Output formatting helpers.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use sentio_core::models::{AlertList, AlertRule, AnomalyList, Device, DeviceList, PredictionList, SystemStatus};
use sentio_core::{CacheEntry, QueryStatus};

/// Print a success message.
pub fn success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning to stderr.
pub fn warn(msg: &str) {
    eprintln!("! {}", msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explain what the entry is showing when it is not a fresh result.
pub fn entry_notes<T>(entry: &CacheEntry<T>) {
    if entry.is_placeholder() {
        warn("Showing demo data; the backend has not answered yet");
    }
    if let (QueryStatus::Error, Some(err)) = (entry.status, entry.error.as_ref()) {
        if entry.data.is_some() {
            warn(&format!("Refresh failed ({}); last updated {}", err, entry.age_display()));
        } else {
            warn(&format!("Fetch failed: {}", err));
        }
    }
}

fn component_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn status(status: &SystemStatus) {
    field("Overall", status.status.as_deref().unwrap_or("unknown"));
    if let Some(ref at) = status.timestamp {
        field("Reported", at);
    }
    println!();
    for (name, value) in &status.components {
        field(name, &component_value(value));
    }
    let unhealthy = status.unhealthy();
    if !unhealthy.is_empty() {
        println!();
        warn(&format!("Unhealthy: {}", unhealthy.join(", ")));
    }
}

pub fn device(device: &Device) {
    field("ID", device.id.as_deref().unwrap_or("-"));
    field("Name", &device.name);
    field("Type", &device.kind);
    field("Protocol", &device.protocol);
    field("Endpoint", device.endpoint.as_deref().unwrap_or("-"));
    field("Status", device.status.as_deref().unwrap_or("unknown"));
}

pub fn devices(list: &DeviceList) {
    println!("{:<10} {:<28} {:<12} {:<10} {}", "ID", "NAME", "TYPE", "PROTOCOL", "STATUS");
    for d in &list.devices {
        println!(
            "{:<10} {:<28} {:<12} {:<10} {}",
            d.id.as_deref().unwrap_or("-"),
            d.name,
            d.kind,
            d.protocol,
            d.status.as_deref().unwrap_or("unknown"),
        );
    }
    println!();
    println!("{} devices, {} online", list.devices.len(), list.online_count());
}

pub fn alert(alert: &AlertRule) {
    field("ID", alert.id.as_deref().unwrap_or("-"));
    field("Name", &alert.name);
    if !alert.description.is_empty() {
        field("Description", &alert.description);
    }
    field("Query", &alert.query);
    field("Threshold", &alert.threshold.to_string());
    field("Severity", &alert.severity);
    field("Enabled", if alert.enabled { "yes" } else { "no" });
    field("State", alert.status.as_deref().unwrap_or("-"));
}

pub fn alerts(list: &AlertList) {
    println!("{:<10} {:<28} {:<10} {:<8} {}", "ID", "NAME", "SEVERITY", "ENABLED", "STATE");
    for a in &list.alerts {
        println!(
            "{:<10} {:<28} {:<10} {:<8} {}",
            a.id.as_deref().unwrap_or("-"),
            a.name,
            a.severity,
            if a.enabled { "yes" } else { "no" },
            a.status.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("{} rules, {} firing", list.alerts.len(), list.firing().count());
}

pub fn anomalies(list: &AnomalyList) {
    if list.anomalies.is_empty() {
        println!("No anomalies detected");
        return;
    }
    println!("{:<26} {:<20} {:>10} {:>6}", "TIME", "METRIC", "VALUE", "SCORE");
    for a in &list.anomalies {
        println!(
            "{:<26} {:<20} {:>10.2} {:>6.2}",
            a.timestamp.as_deref().unwrap_or("-"),
            a.metric,
            a.value,
            a.score,
        );
    }
}

pub fn predictions(list: &PredictionList) {
    if list.predictions.is_empty() {
        println!("No predictions available");
        return;
    }
    println!("{:<16} {:<8} {:>10} {}", "DEVICE", "RISK", "CONFIDENCE", "TIME TO FAILURE");
    for p in &list.predictions {
        println!(
            "{:<16} {:<8} {:>9.0}% {}",
            p.device_id,
            p.risk_level,
            p.confidence * 100.0,
            p.estimated_time_to_failure.as_deref().unwrap_or("-"),
        );
    }
    let high = list.high_risk_count();
    if high > 0 {
        println!();
        warn(&format!("{} device(s) at high risk", high));
    }
}
