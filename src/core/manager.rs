//! Per-source buffers, the active-source selector and remote liveness.
//!
//! Every source owns one lock guarding its buffer, latest values, noise
//! stream and (for remote sources) its [`LivenessRecord`]. An append
//! synthesizes, pushes, evicts and marks the device seen under a single write
//! guard, so readers observe either the state before or after it. Sources
//! never share a lock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::api::{UpdateSensorsRequest, ValidationError};
use crate::core::buffer::{DerivedRecord, RangePolicy, SourceBuffer, YRange};
use crate::core::glucose::{minute_of_day, GlucoseSynthesizer, NoiseSource, SynthConfig};
use crate::core::source::{DataSource, SensorValues};

/// Buffer-manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Records kept per source
    pub capacity: usize,
    /// Y-axis derivation
    pub range: RangePolicy,
    /// A remote device counts as connected while its last ingest is younger than this
    pub connected_window: Duration,
    /// Minimum spacing of poll-driven manual records
    pub manual_tick: Duration,
    /// Glucose formula constants
    pub synth: SynthConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: crate::core::buffer::DEFAULT_CAPACITY,
            range: RangePolicy::default(),
            connected_window: Duration::seconds(10),
            manual_tick: Duration::seconds(1),
            synth: SynthConfig::default(),
        }
    }
}

/// Last time a remote source delivered data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub last_seen_at: Option<DateTime<Utc>>,
    pub device_connected: bool,
}

impl LivenessRecord {
    fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = Some(at);
        self.device_connected = true;
    }

    /// Refresh the connected flag against `window`.
    fn refresh(&mut self, now: DateTime<Utc>, window: Duration) -> bool {
        self.device_connected = self
            .last_seen_at
            .map(|seen| now - seen < window)
            .unwrap_or(false);
        self.device_connected
    }
}

/// Emitted after a successful append to a remote source.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestEvent {
    pub source: DataSource,
    pub at: DateTime<Utc>,
    pub glucose: f64,
}

/// Consistent copy of one source taken under its lock.
#[derive(Debug, Clone)]
pub struct SourceView {
    pub source: DataSource,
    pub records: Vec<DerivedRecord>,
    pub y_range: YRange,
    pub values: SensorValues,
    pub last_update: Option<DateTime<Utc>>,
    pub device_connected: bool,
}

impl SourceView {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct SourceSlot {
    buffer: SourceBuffer,
    values: SensorValues,
    last_update: Option<DateTime<Utc>>,
    noise: NoiseSource,
    liveness: Option<LivenessRecord>,
}

impl SourceSlot {
    fn new(source: DataSource, capacity: usize, noise: NoiseSource) -> Self {
        Self {
            buffer: SourceBuffer::new(capacity),
            values: SensorValues::default(),
            last_update: None,
            noise,
            liveness: source.is_remote().then(LivenessRecord::default),
        }
    }
}

/// Owns one bounded buffer per data source.
pub struct SourceBufferManager {
    config: ManagerConfig,
    synth: GlucoseSynthesizer,
    tz: chrono_tz::Tz,
    slots: [RwLock<SourceSlot>; 2],
    active: RwLock<DataSource>,
    events: broadcast::Sender<IngestEvent>,
}

impl SourceBufferManager {
    pub fn new(config: ManagerConfig) -> Self {
        let tz = config.synth.tz();
        let slots = DataSource::ALL.map(|source| {
            RwLock::new(SourceSlot::new(
                source,
                config.capacity,
                NoiseSource::from_config(&config.synth, source.index() as u64),
            ))
        });
        let (events, _) = broadcast::channel(64);

        Self {
            synth: GlucoseSynthesizer::new(config.synth.clone()),
            tz,
            slots,
            active: RwLock::new(DataSource::default()),
            events,
            config,
        }
    }

    fn slot(&self, source: DataSource) -> &RwLock<SourceSlot> {
        &self.slots[source.index()]
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Wall-clock label in the configured zone.
    pub fn time_label(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.tz).format("%H:%M:%S").to_string()
    }

    /// Receive an [`IngestEvent`] for every remote append.
    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.events.subscribe()
    }

    /// Synthesize a record from `values`, append it to `source` and evict past capacity.
    pub async fn append(
        &self,
        source: DataSource,
        values: SensorValues,
        now: DateTime<Utc>,
    ) -> DerivedRecord {
        let record = {
            let mut slot = self.slot(source).write().await;
            let record = self.append_locked(&mut slot, values, now);
            if let Some(ref mut liveness) = slot.liveness {
                liveness.mark_seen(now);
            }
            record
        };

        if source.is_remote() {
            // No subscribers is fine.
            let _ = self.events.send(IngestEvent {
                source,
                at: now,
                glucose: record.glucose,
            });
        }

        tracing::debug!("{} point: {:.1} mg/dL", source, record.glucose);
        record
    }

    fn append_locked(
        &self,
        slot: &mut SourceSlot,
        values: SensorValues,
        now: DateTime<Utc>,
    ) -> DerivedRecord {
        let noise = slot.noise.sample();
        let glucose = self
            .synth
            .synthesize(&values, minute_of_day(now, &self.tz), noise);
        let record = DerivedRecord::new(self.time_label(now), glucose, &values);

        slot.values = values;
        slot.last_update = Some(now);
        slot.buffer.push(record.clone());
        record
    }

    /// Apply a manual slider update and append the resulting record.
    pub async fn update_manual(
        &self,
        update: &UpdateSensorsRequest,
        now: DateTime<Utc>,
    ) -> Result<DerivedRecord, ValidationError> {
        let mut slot = self.slot(DataSource::Manual).write().await;
        let values = update.apply(slot.values)?;
        Ok(self.append_locked(&mut slot, values, now))
    }

    /// Advance the manual chart when manual is active and a tick has elapsed.
    ///
    /// Returns the appended record, if any.
    pub async fn tick_manual(&self, now: DateTime<Utc>) -> Option<DerivedRecord> {
        if self.active().await != DataSource::Manual {
            return None;
        }

        let mut slot = self.slot(DataSource::Manual).write().await;
        let due = slot
            .last_update
            .map(|last| now - last >= self.config.manual_tick)
            .unwrap_or(true);
        if !due {
            return None;
        }
        let values = slot.values;
        Some(self.append_locked(&mut slot, values, now))
    }

    /// Records, length and y-range of one source.
    pub async fn read(&self, source: DataSource) -> (Vec<DerivedRecord>, usize, YRange) {
        let slot = self.slot(source).read().await;
        (
            slot.buffer.to_vec(),
            slot.buffer.len(),
            slot.buffer.y_range(&self.config.range),
        )
    }

    /// Everything a poll response needs about `source`.
    pub async fn view(&self, source: DataSource, now: DateTime<Utc>) -> SourceView {
        // Write guard only to refresh the connected flag.
        let mut slot = self.slot(source).write().await;
        let window = self.config.connected_window;
        let device_connected = slot
            .liveness
            .as_mut()
            .map(|l| l.refresh(now, window))
            .unwrap_or(false);

        SourceView {
            source,
            records: slot.buffer.to_vec(),
            y_range: slot.buffer.y_range(&self.config.range),
            values: slot.values,
            last_update: slot.last_update,
            device_connected,
        }
    }

    /// Liveness of a remote source; `None` for local sources.
    pub async fn liveness(&self, source: DataSource) -> Option<LivenessRecord> {
        self.slot(source).read().await.liveness
    }

    /// Replace the source's buffer with an empty one and restore its defaults.
    pub async fn clear(&self, source: DataSource) {
        let mut slot = self.slot(source).write().await;
        slot.buffer = SourceBuffer::new(self.config.capacity);
        slot.values = SensorValues::default();
        slot.last_update = None;
        if let Some(ref mut liveness) = slot.liveness {
            *liveness = LivenessRecord::default();
        }
        tracing::info!("Cleared {} buffer", source);
    }

    pub async fn switch_active(&self, source: DataSource) {
        let mut active = self.active.write().await;
        if *active != source {
            tracing::info!("Active source: {} -> {}", *active, source);
        }
        *active = source;
    }

    pub async fn active(&self) -> DataSource {
        *self.active.read().await
    }
}

impl Default for SourceBufferManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
