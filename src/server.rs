//! HTTP server for sensor pushes and dashboard polls.
//!
//! This module provides an HTTP server that:
//! - Accepts normalized sensor pushes via POST /api/sensor-data
//! - Keeps one bounded glucose buffer per data source
//! - Serves the active buffer, y-range and connection flag to pollers
//!
//! # Architecture
//!
//! ```text
//! Sensor node ──→ POST /api/sensor-data ──→ SourceBufferManager ──→ GET /api/get-current-data ──→ Dashboard
//!                                                │
//!                                          [IngestEvent]
//!                                                ↓
//!                                        liveness watchdog
//! ```

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast::error::RecvError, oneshot};
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};

use crate::api::{
    ClearBufferRequest, CurrentDataResponse, HealthResponse, SensorDataRequest, SensorSnapshot,
    SetSourceRequest, StatusResponse, UpdateSensorsRequest, ValidationError,
};
use crate::config::Config;
use crate::core::{
    DataSource, DerivedRecord, LivenessMonitor, LivenessState, LivenessThresholds,
    ManagerConfig, SourceBufferManager,
};
use crate::stats::IngestStats;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Buffer and synthesis settings
    pub manager: ManagerConfig,
    /// Thresholds for the server-side liveness log
    pub liveness: LivenessThresholds,
}

impl ServerConfig {
    /// Create a new server configuration with default buffers on localhost.
    pub fn new(port: u16, manager: ManagerConfig) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            manager,
            liveness: LivenessThresholds::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            manager: config.manager_config(),
            liveness: config.monitor.thresholds(),
        }
    }
}

/// Shared server state
pub struct ServerState {
    manager: SourceBufferManager,
    stats: IngestStats,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            manager: SourceBufferManager::new(config.manager.clone()),
            stats: IngestStats::new(),
        }
    }

    pub fn manager(&self) -> &SourceBufferManager {
        &self.manager
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn bad_request(e: ValidationError) -> ApiError {
    tracing::warn!("Rejected request: {}", e);
    (StatusCode::BAD_REQUEST, Json(StatusResponse::error(e.to_string())))
}

fn malformed(rejection: JsonRejection) -> ApiError {
    bad_request(ValidationError::Malformed(rejection.body_text()))
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stats: state.stats.snapshot(),
    })
}

/// POST /api/sensor-data
///
/// Accepts one push from the sensor node and appends it to the esp32 buffer.
async fn sensor_data(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SensorDataRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let validated = payload
        .map_err(malformed)
        .and_then(|Json(body)| body.validate().map_err(bad_request));
    let values = match validated {
        Ok(values) => values,
        Err(e) => {
            state.stats.record_push_rejected();
            return Err(e);
        }
    };

    let record = state
        .manager
        .append(DataSource::Esp32, values, Utc::now())
        .await;
    state.stats.record_push_accepted();

    tracing::debug!(
        "ESP32 data received: red {:.3} ir {:.3} temp {:.1} motion {:.2} -> {:.1} mg/dL",
        values.red_signal,
        values.ir_signal,
        values.temperature,
        values.motion,
        record.glucose
    );

    Ok(Json(StatusResponse::success("ESP32 data received")))
}

/// GET /api/get-current-data
async fn get_current_data(State(state): State<Arc<ServerState>>) -> Json<CurrentDataResponse> {
    state.stats.record_poll();

    let now = Utc::now();
    let active = state.manager.active().await;
    state.manager.tick_manual(now).await;
    let view = state.manager.view(active, now).await;

    Json(CurrentDataResponse {
        status: "success".to_string(),
        sensor_values: SensorSnapshot {
            red_signal: view.values.red_signal,
            ir_signal: view.values.ir_signal,
            temperature: view.values.temperature,
            motion: view.values.motion,
            device_connected: active.is_remote() && view.device_connected,
            last_update: view
                .last_update
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        },
        data_count: view.len(),
        glucose_data: view.records,
        y_range: view.y_range,
        data_source: active,
        timestamp: state.manager.time_label(now),
    })
}

/// POST /api/set-data-source
async fn set_data_source(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SetSourceRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(body) = payload.map_err(malformed)?;
    let source = body.source().map_err(bad_request)?;

    state.manager.switch_active(source).await;

    let mut response = StatusResponse::success(format!("Switched to {source}"));
    response.data_source = Some(source);
    Ok(Json(response))
}

/// POST /api/update-sensors
async fn update_sensors(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<UpdateSensorsRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(body) = payload.map_err(malformed)?;
    state
        .manager
        .update_manual(&body, Utc::now())
        .await
        .map_err(bad_request)?;
    state.stats.record_manual_update();

    Ok(Json(StatusResponse::success("Manual sensors updated")))
}

/// POST /api/clear-buffer
///
/// An empty body or a missing `buffer_name` clears the active source; a body
/// that does not decode is rejected.
async fn clear_buffer(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let request: ClearBufferRequest = if body.iter().all(|b| b.is_ascii_whitespace()) {
        ClearBufferRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| bad_request(ValidationError::Malformed(e.to_string())))?
    };
    let source = match request.buffer_name {
        Some(name) => name.parse().map_err(bad_request)?,
        None => state.manager.active().await,
    };

    state.manager.clear(source).await;
    state.stats.record_clear();

    Ok(Json(StatusResponse::success(format!("Cleared {source} buffer"))))
}

/// Render records as CSV with a header row.
pub fn records_to_csv(records: &[DerivedRecord]) -> String {
    let mut csv = String::from("Time,Glucose,Red,IR,Temperature,Motion\n");
    for r in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.time, r.glucose, r.red, r.ir, r.temperature, r.motion
        ));
    }
    csv
}

/// GET /api/download-csv
async fn download_csv(State(state): State<Arc<ServerState>>) -> Response {
    let source = state.manager.active().await;
    let (records, _, _) = state.manager.read(source).await;

    if records.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error("No data")),
        )
            .into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"glucose_{source}.csv\""),
            ),
        ],
        records_to_csv(&records),
    )
        .into_response()
}

/// Build the router over existing state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sensor-data", post(sensor_data))
        .route("/api/get-current-data", get(get_current_data))
        .route("/api/set-data-source", post(set_data_source))
        .route("/api/update-sensors", post(update_sensors))
        .route("/api/clear-buffer", post(clear_buffer))
        .route("/api/download-csv", get(download_csv))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Re-evaluate server-side liveness from the manager's record.
///
/// A cleared esp32 buffer forgets the device; a manual active source
/// suspends evaluation.
async fn liveness_step(
    manager: &SourceBufferManager,
    monitor: &mut LivenessMonitor,
    now: DateTime<Utc>,
) -> LivenessState {
    let last_seen = manager
        .liveness(DataSource::Esp32)
        .await
        .and_then(|record| record.last_seen_at);
    match last_seen {
        Some(seen) => monitor.mark_seen(seen),
        None => monitor.reset(),
    }
    monitor.observe(manager.active().await, false, now)
}

/// Log remote-device liveness transitions as seen by the server.
async fn liveness_watchdog(
    state: Arc<ServerState>,
    thresholds: LivenessThresholds,
    mut stop: oneshot::Receiver<()>,
) {
    let mut events = state.manager.subscribe();
    let mut monitor = LivenessMonitor::new(thresholds);
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            event = events.recv() => match event {
                Ok(event) => {
                    monitor.mark_seen(event.at);
                    monitor.observe(state.manager.active().await, false, event.at);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Liveness watchdog skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = interval.tick() => {
                liveness_step(&state.manager, &mut monitor, Utc::now()).await;
            }
        }
    }
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    let app = router(state.clone());

    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Monitor server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (watchdog_tx, watchdog_rx) = oneshot::channel::<()>();

    tokio::spawn(liveness_watchdog(state.clone(), config.liveness, watchdog_rx));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        let _ = watchdog_tx.send(());
        tracing::info!("{}", state.stats.summary());
    });

    Ok((actual_addr, shutdown_tx))
}
