//! Integration tests for the monitor HTTP server

use blinkband_monitor::api::{CurrentDataResponse, UpdateSensorsRequest};
use blinkband_monitor::client::{ClientError, MonitorClient};
use blinkband_monitor::core::{DataSource, ManagerConfig, YRange};
use blinkband_monitor::server::{run, ServerConfig};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;

async fn start_server() -> (SocketAddr, oneshot::Sender<()>) {
    let mut manager = ManagerConfig::default();
    manager.synth.noise_std_dev = 0.0;
    manager.synth.noise_seed = Some(7);
    let config = ServerConfig::new(0, manager);

    let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown_tx)
}

fn sample(red: f64, ir: f64, temperature: f64, motion: f64) -> serde_json::Value {
    serde_json::json!({
        "red_signal": red,
        "ir_signal": ir,
        "temperature": temperature,
        "motion": motion,
        "device_id": "esp32_max30102",
    })
}

async fn push(client: &reqwest::Client, addr: SocketAddr, body: &serde_json::Value) -> reqwest::Response {
    client
        .post(format!("http://{}/api/sensor-data", addr))
        .json(body)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, shutdown_tx) = start_server().await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());
    assert_eq!(body["stats"]["pushes_accepted"], 0);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_three_pushes_two_seconds_apart_show_up_in_poll() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();
    let monitor = MonitorClient::new(format!("http://{}", addr));

    monitor.set_source(DataSource::Esp32).await.unwrap();

    let samples = [
        sample(0.55, 0.70, 36.4, 0.20),
        sample(0.60, 0.72, 36.6, 0.25),
        sample(0.45, 0.65, 36.9, 0.40),
    ];
    for (i, body) in samples.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        let response = push(&client, addr, body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let reply: serde_json::Value = response.json().await.unwrap();
        assert_eq!(reply["status"], "success");
    }

    let data: CurrentDataResponse = monitor.current_data().await.unwrap();
    assert_eq!(data.status, "success");
    assert_eq!(data.data_source, DataSource::Esp32);
    assert_eq!(data.data_count, 3);
    assert_eq!(data.glucose_data.len(), 3);
    assert!(data.sensor_values.device_connected);
    assert!(data.sensor_values.last_update.is_some());
    assert_eq!(data.sensor_values.temperature, 36.9);

    let min = data.glucose_data.iter().map(|r| r.glucose).fold(f64::INFINITY, f64::min);
    let max = data.glucose_data.iter().map(|r| r.glucose).fold(f64::NEG_INFINITY, f64::max);
    assert!(data.y_range.min <= min - 5.0);
    assert!(data.y_range.max >= max + 5.0);
    assert!(data.y_range.span() >= 20.0);

    let health = monitor.health().await.unwrap();
    assert_eq!(health.stats.pushes_accepted, 3);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_push_with_missing_field_is_rejected() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({"red_signal": 0.5, "ir_signal": 0.6, "temperature": 36.5});
    let response = push(&client, addr, &body).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let reply: serde_json::Value = response.json().await.unwrap();
    assert_eq!(reply["status"], "error");
    assert!(reply["message"].as_str().unwrap().contains("motion"));

    let response = client
        .post(format!("http://{}/api/sensor-data", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let monitor = MonitorClient::new(format!("http://{}", addr));
    monitor.set_source(DataSource::Esp32).await.unwrap();
    let data = monitor.current_data().await.unwrap();
    assert_eq!(data.data_count, 0);
    assert_eq!(monitor.health().await.unwrap().stats.pushes_rejected, 2);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_push_with_mistyped_extras_is_accepted() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "red_signal": 0.5,
        "ir_signal": 0.6,
        "temperature": 36.5,
        "motion": 0.2,
        "device_id": 42,
        "timestamp": "2024-01-01T00:00:00Z",
        "raw_red": "n/a",
        "firmware": {"rev": 3},
    });
    let response = push(&client, addr, &body).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let monitor = MonitorClient::new(format!("http://{}", addr));
    monitor.set_source(DataSource::Esp32).await.unwrap();
    assert_eq!(monitor.current_data().await.unwrap().data_count, 1);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_clear_with_undecodable_body_is_rejected() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();
    let monitor = MonitorClient::new(format!("http://{}", addr));

    monitor.set_source(DataSource::Esp32).await.unwrap();
    push(&client, addr, &sample(0.6, 0.7, 36.5, 0.3)).await;

    let response = client
        .post(format!("http://{}/api/clear-buffer", addr))
        .json(&serde_json::json!({"buffer_name": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let reply: serde_json::Value = response.json().await.unwrap();
    assert_eq!(reply["status"], "error");

    let response = client
        .post(format!("http://{}/api/clear-buffer", addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    assert_eq!(monitor.current_data().await.unwrap().data_count, 1);
    assert_eq!(monitor.health().await.unwrap().stats.buffers_cleared, 0);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_switching_sources_preserves_buffers() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();
    let monitor = MonitorClient::new(format!("http://{}", addr));

    push(&client, addr, &sample(0.6, 0.7, 36.5, 0.3)).await;
    push(&client, addr, &sample(0.6, 0.7, 36.5, 0.3)).await;

    // Manual is active by default; a poll advances the manual chart only.
    let manual = monitor.current_data().await.unwrap();
    assert_eq!(manual.data_source, DataSource::Manual);
    assert_eq!(manual.data_count, 1);
    assert!(!manual.sensor_values.device_connected);

    let reply = monitor.set_source(DataSource::Esp32).await.unwrap();
    assert_eq!(reply.data_source, Some(DataSource::Esp32));

    let esp32 = monitor.current_data().await.unwrap();
    assert_eq!(esp32.data_count, 2);
    assert!(esp32.sensor_values.device_connected);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_unknown_source_is_rejected() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/set-data-source", addr))
        .json(&serde_json::json!({"data_source": "bluetooth"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_manual_update_moves_values() {
    let (addr, shutdown_tx) = start_server().await;
    let monitor = MonitorClient::new(format!("http://{}", addr));

    let update = UpdateSensorsRequest {
        temperature: Some(37.5),
        ..Default::default()
    };
    let reply = monitor.update_sensors(&update).await.unwrap();
    assert!(reply.is_success());

    let data = monitor.current_data().await.unwrap();
    assert_eq!(data.sensor_values.temperature, 37.5);
    assert_eq!(data.sensor_values.red_signal, 0.6);
    assert!(data.data_count >= 1);
    assert_eq!(data.glucose_data[0].temperature, 37.5);

    let err = monitor
        .update_sensors(&UpdateSensorsRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 400, .. }));

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_clear_buffer_resets_source() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();
    let monitor = MonitorClient::new(format!("http://{}", addr));

    monitor.set_source(DataSource::Esp32).await.unwrap();
    push(&client, addr, &sample(0.2, 0.3, 35.0, 0.9)).await;

    let reply = monitor.clear_buffer(Some(DataSource::Esp32)).await.unwrap();
    assert!(reply.is_success());

    let data = monitor.current_data().await.unwrap();
    assert_eq!(data.data_count, 0);
    assert!(!data.sensor_values.device_connected);
    assert_eq!(data.sensor_values.last_update, None);
    assert_eq!(data.sensor_values.red_signal, 0.6);
    assert_eq!(data.y_range, YRange { min: 50.0, max: 150.0 });

    // No body clears the active source.
    push(&client, addr, &sample(0.2, 0.3, 35.0, 0.9)).await;
    let response = client
        .post(format!("http://{}/api/clear-buffer", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(monitor.current_data().await.unwrap().data_count, 0);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_download_csv() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();
    let monitor = MonitorClient::new(format!("http://{}", addr));

    monitor.set_source(DataSource::Esp32).await.unwrap();
    let err = monitor.download_csv().await.unwrap_err();
    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "No data");
        }
        other => panic!("unexpected error: {other}"),
    }

    push(&client, addr, &sample(0.6, 0.7, 36.5, 0.3)).await;
    let response = client
        .get(format!("http://{}/api/download-csv", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"glucose_esp32.csv\"");

    let body = response.text().await.unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "Time,Glucose,Red,IR,Temperature,Motion");
    assert_eq!(lines.len(), 2);

    let _ = shutdown_tx.send(());
}

#[tokio::test]
async fn test_cors_preflight() {
    let (addr, shutdown_tx) = start_server().await;
    let client = reqwest::Client::new();

    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/api/get-current-data", addr),
        )
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    let _ = shutdown_tx.send(());
}
