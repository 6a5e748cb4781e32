//! The acquisition node: startup gate, sampling tick and paced pushes.
//!
//! Sampling never depends on the uplink. When the link is down the node keeps
//! smoothing, attempts a bounded reconnect and drops the scheduled push.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use crate::acquisition::sensor::OpticalSensor;
use crate::acquisition::smoothing::{MotionEstimator, SmoothingBuffer, IR_DOMAIN, RED_DOMAIN};
use crate::acquisition::types::{NodeReading, NormalizedSignal, RawSample};
use crate::acquisition::uplink::Uplink;

/// Terminal startup failures. The node does no useful work after either.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("Optical sensor not found; check wiring (VCC 3.3V, GND, SDA GPIO21, SCL GPIO22)")]
    SensorNotFound,

    #[error("No finger detected after {attempts} warm-up polls")]
    WarmupTimeout { attempts: u32 },
}

impl AcquisitionError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcquisitionError::SensorNotFound | AcquisitionError::WarmupTimeout { .. }
        )
    }
}

/// Acquisition node timing and startup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Server base URL for pushes
    pub server_url: String,
    /// Identifier sent with every push
    pub device_id: String,
    /// Tick period
    #[serde(with = "crate::config::duration_ms_serde")]
    pub sample_interval: Duration,
    /// Minimum spacing of pushes
    #[serde(with = "crate::config::duration_ms_serde")]
    pub push_interval: Duration,
    /// Minimum spacing of temperature reads
    #[serde(with = "crate::config::duration_ms_serde")]
    pub temperature_interval: Duration,
    /// Connection attempts per (re)connect
    pub connect_attempts: u32,
    /// Delay between connection attempts
    #[serde(with = "crate::config::duration_ms_serde")]
    pub connect_delay: Duration,
    /// IR count that indicates a finger on the sensor
    pub warmup_threshold: i64,
    /// Warm-up polls before giving up
    pub warmup_max_polls: u32,
    /// Delay between warm-up polls
    #[serde(with = "crate::config::duration_ms_serde")]
    pub warmup_poll_delay: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            device_id: default_device_id(),
            sample_interval: Duration::from_millis(100),
            push_interval: Duration::from_secs(2),
            temperature_interval: Duration::from_secs(5),
            connect_attempts: 20,
            connect_delay: Duration::from_millis(500),
            warmup_threshold: 50_000,
            warmup_max_polls: 600,
            warmup_poll_delay: Duration::from_millis(100),
        }
    }
}

/// Device ID from hostname plus a short instance suffix.
pub fn default_device_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("sim-{}-{}", hostname, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Lifecycle of the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Running,
    Fatal(AcquisitionError),
}

/// What happened to the push slot of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The push interval has not elapsed.
    NotDue,
    /// The server accepted the push.
    Sent,
    /// The push was attempted and failed; the next slot tries again.
    Failed(String),
    /// The uplink was down; the push was skipped.
    Dropped,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub reading: NodeReading,
    pub push: PushOutcome,
}

/// Push counters for a node run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub ticks: u64,
    pub pushes_sent: u64,
    pub pushes_failed: u64,
    pub pushes_dropped: u64,
}

/// Single-threaded cooperative acquisition loop.
pub struct AcquisitionNode<S, U> {
    sensor: S,
    uplink: U,
    config: NodeConfig,
    state: NodeState,
    red: SmoothingBuffer,
    ir: SmoothingBuffer,
    motion: MotionEstimator,
    temperature: f64,
    last_temperature_read: Option<Duration>,
    last_push: Option<Duration>,
    summary: NodeSummary,
}

impl<S: OpticalSensor, U: Uplink> AcquisitionNode<S, U> {
    pub fn new(sensor: S, uplink: U, config: NodeConfig) -> Self {
        Self {
            sensor,
            uplink,
            config,
            state: NodeState::Booting,
            red: SmoothingBuffer::new(),
            ir: SmoothingBuffer::new(),
            motion: MotionEstimator::new(),
            temperature: 0.0,
            last_temperature_read: None,
            last_push: None,
            summary: NodeSummary::default(),
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn summary(&self) -> NodeSummary {
        self.summary
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Probe the sensor, bring up the uplink and wait for a finger.
    ///
    /// Uplink failure is not fatal; a missing sensor or a warm-up timeout is,
    /// and leaves the node in [`NodeState::Fatal`].
    pub async fn start(&mut self) -> Result<(), AcquisitionError> {
        if let Err(e) = self.try_start().await {
            tracing::error!("Acquisition halted: {}", e);
            self.state = NodeState::Fatal(e.clone());
            return Err(e);
        }
        self.state = NodeState::Running;
        Ok(())
    }

    async fn try_start(&mut self) -> Result<(), AcquisitionError> {
        if !self.sensor.probe() {
            return Err(AcquisitionError::SensorNotFound);
        }
        tracing::info!("Optical sensor found");

        self.connect_uplink().await;

        tracing::info!("Place your finger on the sensor...");
        for _ in 0..self.config.warmup_max_polls {
            if self.sensor.read_ir() >= self.config.warmup_threshold {
                tracing::info!("Finger detected, sensor ready");
                return Ok(());
            }
            tokio::time::sleep(self.config.warmup_poll_delay).await;
        }

        Err(AcquisitionError::WarmupTimeout {
            attempts: self.config.warmup_max_polls,
        })
    }

    /// Bounded fixed-delay connection attempts. Returns whether the link is up.
    pub async fn connect_uplink(&mut self) -> bool {
        for attempt in 1..=self.config.connect_attempts {
            if self.uplink.connect().await {
                tracing::info!("Uplink connected after {} attempt(s)", attempt);
                return true;
            }
            if attempt < self.config.connect_attempts {
                tokio::time::sleep(self.config.connect_delay).await;
            }
        }
        tracing::warn!(
            "Uplink unavailable after {} attempts, sampling continues",
            self.config.connect_attempts
        );
        false
    }

    /// Read one sample per channel and update every derived value.
    ///
    /// `elapsed` is device time since boot.
    pub fn sample(&mut self, elapsed: Duration) -> NodeReading {
        let raw = RawSample {
            red: self.sensor.read_red(),
            ir: self.sensor.read_ir(),
            captured_at: elapsed,
        };

        let smoothed_red = self.red.push(raw.red);
        let smoothed_ir = self.ir.push(raw.ir);

        let temperature_due = self
            .last_temperature_read
            .map(|last| elapsed.saturating_sub(last) >= self.config.temperature_interval)
            .unwrap_or(true);
        if temperature_due {
            self.temperature = self.sensor.read_temperature();
            self.last_temperature_read = Some(elapsed);
        }

        let motion = self.motion.update(smoothed_ir);

        NodeReading {
            raw,
            smoothed_red,
            smoothed_ir,
            normalized: NormalizedSignal {
                red: RED_DOMAIN.normalize(smoothed_red),
                ir: IR_DOMAIN.normalize(smoothed_ir),
            },
            temperature: self.temperature,
            motion,
        }
    }

    fn push_due(&self, elapsed: Duration) -> bool {
        self.last_push
            .map(|last| elapsed.saturating_sub(last) >= self.config.push_interval)
            .unwrap_or(true)
    }

    /// One loop iteration: reconnect if needed, sample, and push if due.
    pub async fn tick(&mut self, elapsed: Duration) -> TickOutcome {
        if !self.uplink.is_connected() {
            tracing::warn!("Uplink down, reconnecting...");
            self.connect_uplink().await;
        }

        let reading = self.sample(elapsed);
        self.summary.ticks += 1;

        if !self.push_due(elapsed) {
            return TickOutcome {
                reading,
                push: PushOutcome::NotDue,
            };
        }
        self.last_push = Some(elapsed);

        tracing::debug!(
            "Raw red {:.0} ir {:.0} | temp {:.1}°C | norm red {:.3} ir {:.3}",
            reading.smoothed_red,
            reading.smoothed_ir,
            reading.temperature,
            reading.normalized.red,
            reading.normalized.ir
        );

        let push = if !self.uplink.is_connected() {
            self.summary.pushes_dropped += 1;
            PushOutcome::Dropped
        } else {
            let body = reading.to_request(&self.config.device_id);
            match self.uplink.push(&body).await {
                Ok(()) => {
                    self.summary.pushes_sent += 1;
                    PushOutcome::Sent
                }
                Err(e) => {
                    tracing::warn!("Push failed: {}", e);
                    self.summary.pushes_failed += 1;
                    PushOutcome::Failed(e.to_string())
                }
            }
        };

        TickOutcome { reading, push }
    }

    /// Start the node and tick until `shutdown` fires.
    pub async fn run(
        &mut self,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<NodeSummary, AcquisitionError> {
        self.start().await?;

        let boot = Instant::now();
        let mut interval = tokio::time::interval(self.config.sample_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Acquisition stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(boot.elapsed()).await;
                }
            }
        }

        Ok(self.summary)
    }
}
