//! Cooperative poll loop feeding a renderer.
//!
//! One tick fetches the active buffer, refreshes the displayed values and
//! liveness, and redraws the chart only when a non-empty buffer differs from
//! the last frame drawn. Ticks never overlap: a slow fetch delays the next
//! tick, and missed ticks are skipped.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::api::CurrentDataResponse;
use crate::client::{ClientError, MonitorClient};
use crate::core::{DataSource, DerivedRecord, LivenessMonitor, LivenessState, LivenessThresholds, YRange};
use crate::monitor::render::Renderer;

/// Anything that can produce a poll response.
#[allow(async_fn_in_trait)]
pub trait SnapshotSource {
    async fn fetch(&mut self) -> Result<CurrentDataResponse, ClientError>;
}

impl SnapshotSource for MonitorClient {
    async fn fetch(&mut self) -> Result<CurrentDataResponse, ClientError> {
        self.current_data().await
    }
}

/// Poll loop settings.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub thresholds: LivenessThresholds,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            thresholds: LivenessThresholds::default(),
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The chart was redrawn.
    Rendered,
    /// Same frame as last time; chart untouched.
    Unchanged,
    /// Empty buffer; last frame kept.
    Empty,
    /// Fetch failed; nothing rendered.
    FetchFailed,
}

/// Counters over the lifetime of a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub ticks: u64,
    pub redraws: u64,
    pub fetch_failures: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct Frame {
    source: DataSource,
    records: Vec<DerivedRecord>,
    y_range: YRange,
}

/// Poll/render loop over a [`SnapshotSource`].
pub struct PollLoop<S: SnapshotSource, R: Renderer> {
    source: S,
    renderer: R,
    config: PollConfig,
    liveness: LivenessMonitor,
    last_frame: Option<Frame>,
    summary: PollSummary,
}

impl<S: SnapshotSource, R: Renderer> PollLoop<S, R> {
    pub fn new(source: S, renderer: R, config: PollConfig) -> Self {
        Self {
            liveness: LivenessMonitor::new(config.thresholds),
            source,
            renderer,
            config,
            last_frame: None,
            summary: PollSummary::default(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn liveness(&self) -> LivenessState {
        self.liveness.state()
    }

    pub fn summary(&self) -> PollSummary {
        self.summary
    }

    /// Run one poll at `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.summary.ticks += 1;

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Poll failed: {}", e);
                self.summary.fetch_failures += 1;
                return TickOutcome::FetchFailed;
            }
        };

        let state = self.liveness.observe(
            snapshot.data_source,
            snapshot.sensor_values.device_connected,
            now,
        );
        self.renderer
            .update_values(&snapshot, state, &self.liveness.describe(now));

        if snapshot.glucose_data.is_empty() {
            return TickOutcome::Empty;
        }

        let frame = Frame {
            source: snapshot.data_source,
            records: snapshot.glucose_data,
            y_range: snapshot.y_range,
        };
        if self.last_frame.as_ref() == Some(&frame) {
            return TickOutcome::Unchanged;
        }

        self.renderer
            .draw_chart(&frame.records, frame.y_range, frame.source);
        self.last_frame = Some(frame);
        self.summary.redraws += 1;
        TickOutcome::Rendered
    }

    /// Tick on the configured interval until `shutdown` fires.
    pub async fn run(&mut self, mut shutdown: oneshot::Receiver<()>) -> PollSummary {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }

        tracing::info!(
            "Poll loop stopped after {} ticks ({} redraws, {} failed fetches)",
            self.summary.ticks,
            self.summary.redraws,
            self.summary.fetch_failures
        );
        self.summary
    }
}
