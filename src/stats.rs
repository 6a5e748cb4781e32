//! Ingest and polling counters for the server.
//!
//! Counters are lock-free so handlers can bump them without touching the
//! buffer locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one server process.
#[derive(Debug)]
pub struct IngestStats {
    /// Sensor pushes appended to a buffer
    pushes_accepted: AtomicU64,
    /// Sensor pushes rejected by validation
    pushes_rejected: AtomicU64,
    /// Manual slider updates applied
    manual_updates: AtomicU64,
    /// Poll responses served
    polls_served: AtomicU64,
    /// Buffers cleared on request
    buffers_cleared: AtomicU64,
    /// Process start time
    started_at: DateTime<Utc>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            pushes_accepted: AtomicU64::new(0),
            pushes_rejected: AtomicU64::new(0),
            manual_updates: AtomicU64::new(0),
            polls_served: AtomicU64::new(0),
            buffers_cleared: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_push_accepted(&self) {
        self.pushes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push_rejected(&self) {
        self.pushes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manual_update(&self) {
        self.manual_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self) {
        self.polls_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.buffers_cleared.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pushes_accepted: self.pushes_accepted.load(Ordering::Relaxed),
            pushes_rejected: self.pushes_rejected.load(Ordering::Relaxed),
            manual_updates: self.manual_updates.load(Ordering::Relaxed),
            polls_served: self.polls_served.load(Ordering::Relaxed),
            buffers_cleared: self.buffers_cleared.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// One-line summary for shutdown logs.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "pushes accepted: {}, rejected: {}, manual updates: {}, polls: {}, clears: {}, uptime: {}s",
            s.pushes_accepted,
            s.pushes_rejected,
            s.manual_updates,
            s.polls_served,
            s.buffers_cleared,
            s.uptime_secs
        )
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub pushes_accepted: u64,
    pub pushes_rejected: u64,
    pub manual_updates: u64,
    pub polls_served: u64,
    pub buffers_cleared: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}
