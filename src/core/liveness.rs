//! Connection liveness for the remote sensor feed.
//!
//! The classification is a pure function of the active source, the
//! server-reported connected flag, the last time the device was seen and the
//! current time. [`LivenessMonitor`] only adds the memory of `last_seen_at`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::source::DataSource;

/// Health of the remote feed as seen by a polling client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    /// The active source is manual; the remote feed is not evaluated.
    ManualMode,
    /// The device has never been seen.
    NeverSeen,
    /// Seen within the recent threshold.
    RecentlySeen,
    /// Seen within the lost threshold but not recently.
    Lost,
    /// Not seen for longer than the lost threshold.
    WaitingNoRecent,
}

impl LivenessState {
    pub fn is_connected(&self) -> bool {
        matches!(self, LivenessState::RecentlySeen)
    }
}

impl fmt::Display for LivenessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LivenessState::ManualMode => "manual mode",
            LivenessState::NeverSeen => "waiting for device",
            LivenessState::RecentlySeen => "device connected",
            LivenessState::Lost => "connection lost",
            LivenessState::WaitingNoRecent => "no recent data",
        };
        f.write_str(label)
    }
}

/// Time boundaries between the seen states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessThresholds {
    /// Below this age the device counts as recently seen
    pub recent: Duration,
    /// Below this age (and not recent) the device counts as lost
    pub lost: Duration,
}

impl LivenessThresholds {
    pub fn from_secs(recent: u64, lost: u64) -> Self {
        Self {
            recent: Duration::seconds(recent as i64),
            lost: Duration::seconds(lost as i64),
        }
    }
}

impl Default for LivenessThresholds {
    fn default() -> Self {
        Self::from_secs(15, 60)
    }
}

/// Classify the feed and return the possibly refreshed `last_seen_at`.
///
/// Manual mode never touches `last_seen_at`.
pub fn classify(
    active: DataSource,
    device_connected: bool,
    last_seen_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    thresholds: &LivenessThresholds,
) -> (LivenessState, Option<DateTime<Utc>>) {
    if !active.is_remote() {
        return (LivenessState::ManualMode, last_seen_at);
    }

    if device_connected {
        return (LivenessState::RecentlySeen, Some(now));
    }

    let state = match last_seen_at {
        Some(seen) => {
            let age = now - seen;
            if age < thresholds.recent {
                LivenessState::RecentlySeen
            } else if age < thresholds.lost {
                LivenessState::Lost
            } else {
                LivenessState::WaitingNoRecent
            }
        }
        None => LivenessState::NeverSeen,
    };

    (state, last_seen_at)
}

/// Client-side liveness tracker fed once per poll.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    thresholds: LivenessThresholds,
    last_seen_at: Option<DateTime<Utc>>,
    state: LivenessState,
}

impl LivenessMonitor {
    pub fn new(thresholds: LivenessThresholds) -> Self {
        Self {
            thresholds,
            last_seen_at: None,
            state: LivenessState::ManualMode,
        }
    }

    /// Evaluate one poll result.
    pub fn observe(
        &mut self,
        active: DataSource,
        device_connected: bool,
        now: DateTime<Utc>,
    ) -> LivenessState {
        let (state, last_seen_at) =
            classify(active, device_connected, self.last_seen_at, now, &self.thresholds);

        if state != self.state {
            tracing::info!("Liveness: {} -> {}", self.state, state);
        }

        self.state = state;
        self.last_seen_at = last_seen_at;
        state
    }

    /// Record an ingest seen by the local process.
    pub fn mark_seen(&mut self, at: DateTime<Utc>) {
        self.last_seen_at = Some(at);
    }

    /// Forget the device, e.g. after its buffer was cleared.
    pub fn reset(&mut self) {
        self.last_seen_at = None;
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn last_seen_at(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at
    }

    /// Human-readable status line.
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        match (self.state, self.last_seen_at) {
            (LivenessState::Lost | LivenessState::WaitingNoRecent, Some(seen)) => {
                format!("{} (last seen {}s ago)", self.state, (now - seen).num_seconds())
            }
            _ => self.state.to_string(),
        }
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(LivenessThresholds::default())
    }
}
