//! Poll/render loop behaviour against a scripted snapshot source

use blinkband_monitor::api::{CurrentDataResponse, SensorSnapshot};
use blinkband_monitor::client::ClientError;
use blinkband_monitor::core::{DataSource, DerivedRecord, LivenessState, SensorValues, YRange};
use blinkband_monitor::monitor::{PollConfig, PollLoop, Renderer, SnapshotSource, TickOutcome};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use tokio::sync::oneshot;

struct ScriptedSource {
    script: VecDeque<Result<CurrentDataResponse, ClientError>>,
    fallback: CurrentDataResponse,
}

impl ScriptedSource {
    fn new(script: Vec<Result<CurrentDataResponse, ClientError>>) -> Self {
        Self {
            script: script.into(),
            fallback: snapshot(DataSource::Esp32, &[100.0], true),
        }
    }
}

impl SnapshotSource for ScriptedSource {
    async fn fetch(&mut self) -> Result<CurrentDataResponse, ClientError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[derive(Default)]
struct RecordingRenderer {
    value_updates: usize,
    states: Vec<LivenessState>,
    charts: Vec<Vec<f64>>,
}

impl Renderer for RecordingRenderer {
    fn update_values(&mut self, _snapshot: &CurrentDataResponse, liveness: LivenessState, _status: &str) {
        self.value_updates += 1;
        self.states.push(liveness);
    }

    fn draw_chart(&mut self, records: &[DerivedRecord], _y_range: YRange, _source: DataSource) {
        self.charts.push(records.iter().map(|r| r.glucose).collect());
    }
}

fn snapshot(source: DataSource, glucose: &[f64], connected: bool) -> CurrentDataResponse {
    let values = SensorValues::default();
    let records: Vec<DerivedRecord> = glucose
        .iter()
        .enumerate()
        .map(|(i, g)| DerivedRecord::new(format!("12:00:{:02}", i * 2), *g, &values))
        .collect();
    CurrentDataResponse {
        status: "success".to_string(),
        sensor_values: SensorSnapshot {
            red_signal: values.red_signal,
            ir_signal: values.ir_signal,
            temperature: values.temperature,
            motion: values.motion,
            device_connected: connected,
            last_update: None,
        },
        data_count: records.len(),
        glucose_data: records,
        y_range: YRange { min: 80.0, max: 120.0 },
        data_source: source,
        timestamp: "12:00:10".to_string(),
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 22, 12, 0, 0).unwrap()
}

fn poll_loop(
    script: Vec<Result<CurrentDataResponse, ClientError>>,
) -> PollLoop<ScriptedSource, RecordingRenderer> {
    PollLoop::new(
        ScriptedSource::new(script),
        RecordingRenderer::default(),
        PollConfig::default(),
    )
}

#[tokio::test]
async fn test_empty_snapshot_keeps_last_frame() {
    let mut poll = poll_loop(vec![
        Ok(snapshot(DataSource::Esp32, &[98.0, 101.5], true)),
        Ok(snapshot(DataSource::Esp32, &[], false)),
    ]);

    assert_eq!(poll.tick(t0()).await, TickOutcome::Rendered);
    assert_eq!(poll.tick(t0() + Duration::seconds(1)).await, TickOutcome::Empty);

    assert_eq!(poll.renderer().charts, vec![vec![98.0, 101.5]]);
    assert_eq!(poll.renderer().value_updates, 2);
}

#[tokio::test]
async fn test_identical_snapshots_do_not_redraw() {
    let first = snapshot(DataSource::Esp32, &[98.0], true);
    let second = snapshot(DataSource::Esp32, &[98.0, 99.0], true);
    let mut poll = poll_loop(vec![Ok(first.clone()), Ok(first), Ok(second)]);

    assert_eq!(poll.tick(t0()).await, TickOutcome::Rendered);
    assert_eq!(poll.tick(t0()).await, TickOutcome::Unchanged);
    assert_eq!(poll.tick(t0()).await, TickOutcome::Rendered);
    assert_eq!(poll.summary().redraws, 2);
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_the_loop() {
    let mut poll = poll_loop(vec![
        Err(ClientError::Network("connection refused".to_string())),
        Ok(snapshot(DataSource::Manual, &[110.0], false)),
    ]);

    assert_eq!(poll.tick(t0()).await, TickOutcome::FetchFailed);
    assert_eq!(poll.tick(t0()).await, TickOutcome::Rendered);

    let summary = poll.summary();
    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(poll.renderer().value_updates, 1);
}

#[tokio::test]
async fn test_liveness_follows_connected_flag_and_age() {
    let mut poll = poll_loop(vec![
        Ok(snapshot(DataSource::Esp32, &[], false)),
        Ok(snapshot(DataSource::Esp32, &[100.0], true)),
        Ok(snapshot(DataSource::Esp32, &[100.0], false)),
        Ok(snapshot(DataSource::Esp32, &[100.0], false)),
        Ok(snapshot(DataSource::Esp32, &[100.0], false)),
        Ok(snapshot(DataSource::Manual, &[100.0], false)),
        Ok(snapshot(DataSource::Esp32, &[100.0], false)),
    ]);

    poll.tick(t0()).await;
    poll.tick(t0() + Duration::seconds(1)).await;
    poll.tick(t0() + Duration::milliseconds(15_900)).await;
    poll.tick(t0() + Duration::milliseconds(16_100)).await;
    poll.tick(t0() + Duration::milliseconds(61_100)).await;
    poll.tick(t0() + Duration::seconds(62)).await;
    poll.tick(t0() + Duration::seconds(63)).await;

    assert_eq!(
        poll.renderer().states,
        vec![
            LivenessState::NeverSeen,
            LivenessState::RecentlySeen,
            LivenessState::RecentlySeen,
            LivenessState::Lost,
            LivenessState::WaitingNoRecent,
            LivenessState::ManualMode,
            LivenessState::WaitingNoRecent,
        ]
    );
    assert_eq!(poll.liveness(), LivenessState::WaitingNoRecent);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let mut poll = PollLoop::new(
        ScriptedSource::new(Vec::new()),
        RecordingRenderer::default(),
        PollConfig {
            interval: std::time::Duration::from_millis(10),
            ..PollConfig::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let _ = shutdown_tx.send(());
    });

    let summary = poll.run(shutdown_rx).await;
    assert!(summary.ticks >= 2);
    assert_eq!(summary.redraws, 1);
    assert_eq!(summary.fetch_failures, 0);
}
