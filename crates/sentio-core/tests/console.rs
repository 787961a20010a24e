//! Console tests against a mock Sentio backend.

use sentio_core::auth::MemoryTokenStorage;
use sentio_core::console::{ANOMALIES_KEY, PREDICTIONS_KEY};
use sentio_core::models::{Device, DeviceList};
use std::time::Duration;

use sentio_core::{ApiClient, Config, Console, CredentialStore, QueryStatus, SessionGate};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gate(server: &MockServer, storage: MemoryTokenStorage) -> SessionGate {
    SessionGate::new(ApiClient::new(&server.uri(), CredentialStore::new(storage)).unwrap())
}

fn console(server: &MockServer) -> Console {
    gate(server, MemoryTokenStorage::with_token("tok"))
        .admit(&Config::default())
        .unwrap()
}

fn device_json(id: &str, name: &str) -> serde_json::Value {
    json!({"id": id, "name": name, "type": "sensor", "protocol": "mqtt", "status": "online"})
}

#[tokio::test]
async fn test_gate_admits_only_when_signed_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok123"})))
        .mount(&server)
        .await;

    let gate = gate(&server, MemoryTokenStorage::new());
    assert!(gate.admit(&Config::default()).is_none());

    gate.login("ops", "x").await.unwrap();
    assert!(gate.admit(&Config::default()).is_some());
}

#[tokio::test]
async fn test_devices_show_placeholder_until_loaded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [device_json("d1", "Boiler")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let console = console(&server);
    let mut devices = console.devices();

    let first = devices.snapshot();
    assert!(first.is_placeholder());
    assert_eq!(first.value(), Some(&DeviceList::placeholder()));

    let loaded = devices.settled().await;
    assert_eq!(loaded.status, QueryStatus::Success);
    let list = loaded.value().unwrap();
    assert_eq!(list.devices.len(), 1);
    assert_eq!(list.devices[0].name, "Boiler");
}

#[tokio::test]
async fn test_device_mutation_refetches_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [device_json("d1", "Boiler")]
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_json("d2", "Chiller")))
        .expect(1)
        .mount(&server)
        .await;

    let console = console(&server);
    let mut devices = console.devices();
    devices.settled().await;

    let created = console
        .create_device(&Device::new("Chiller", "sensor", "mqtt"))
        .await
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("d2"));

    let refreshed = devices.settled().await;
    assert_eq!(refreshed.status, QueryStatus::Success);
}

#[tokio::test]
async fn test_failed_mutation_keeps_cached_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alerts": []})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/alerts/a9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Alert not found"})))
        .mount(&server)
        .await;

    let console = console(&server);
    let mut alerts = console.alerts();
    alerts.settled().await;

    let err = console.delete_alert("a9").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!alerts.snapshot().is_loading());
}

#[tokio::test]
async fn test_status_unauthorized_signs_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
        .mount(&server)
        .await;

    let gate = gate(&server, MemoryTokenStorage::with_token("tok"));
    let console = gate.admit(&Config::default()).unwrap();

    let mut status = console.status();
    let entry = status.settled().await;
    assert_eq!(entry.status, QueryStatus::Error);
    assert!(entry.error.as_ref().is_some_and(|e| e.is_unauthorized()));

    gate.signed_out().await;
    assert!(!gate.is_authenticated());
}

#[tokio::test]
async fn test_start_and_stop_polling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/anomalies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"anomalies": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ai/predictions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&server)
        .await;

    let console = console(&server);
    console.start_polling();
    console.start_polling();

    assert!(console.is_polling());
    assert!(console.scheduler().is_polling(ANOMALIES_KEY));
    assert!(console.scheduler().is_polling(PREDICTIONS_KEY));
    assert_eq!(
        console.scheduler().interval(ANOMALIES_KEY),
        Some(Duration::from_secs(30))
    );

    let mut anomalies = console.anomalies();
    assert!(anomalies.settled().await.data.is_some());

    console.stop_polling();
    assert!(!console.is_polling());
    assert!(console.scheduler().polled_keys().is_empty());
}

fn fast_polling() -> Config {
    Config {
        anomalies_poll_secs: 1,
        predictions_poll_secs: 1,
        ..Config::default()
    }
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}

#[tokio::test]
async fn test_rejected_token_stops_polling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/anomalies"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ai/predictions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&server)
        .await;

    let gate = gate(&server, MemoryTokenStorage::with_token("tok"));
    let console = gate.admit(&fast_polling()).unwrap();
    console.start_polling();

    tokio::time::timeout(Duration::from_secs(5), gate.signed_out())
        .await
        .expect("401 should end the session");
    tokio::time::timeout(Duration::from_secs(5), async {
        while console.is_polling() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("polling should stop with the session");
    assert!(console.scheduler().polled_keys().is_empty());

    // Let anything already on the wire land
    tokio::time::sleep(Duration::from_millis(200)).await;
    let seen = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(request_count(&server).await, seen);
}

#[tokio::test]
async fn test_logout_stops_polling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ai/anomalies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"anomalies": []})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ai/predictions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
        .mount(&server)
        .await;

    let gate = gate(&server, MemoryTokenStorage::with_token("tok"));
    let console = gate.admit(&fast_polling()).unwrap();
    console.start_polling();
    assert!(console.anomalies().settled().await.data.is_some());

    gate.logout().unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while console.is_polling() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("polling should stop after logout");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let seen = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(request_count(&server).await, seen);
}

#[tokio::test]
async fn test_polling_refused_while_signed_out() {
    let server = MockServer::start().await;

    let gate = gate(&server, MemoryTokenStorage::with_token("tok"));
    let console = gate.admit(&Config::default()).unwrap();
    gate.logout().unwrap();

    console.start_polling();
    assert!(!console.is_polling());
    assert!(console.scheduler().polled_keys().is_empty());
    assert_eq!(request_count(&server).await, 0);
}
