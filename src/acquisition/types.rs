//! Sample types produced by the acquisition node.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::SensorDataRequest;
use crate::core::source::SensorValues;

/// One raw optical reading. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// Red LED ADC count
    pub red: i64,
    /// IR LED ADC count
    pub ir: i64,
    /// Device time since boot
    pub captured_at: Duration,
}

/// Smoothed optical channels mapped into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    pub red: f64,
    pub ir: f64,
}

/// Everything derived from one acquisition tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeReading {
    pub raw: RawSample,
    /// Mean of the red smoothing window
    pub smoothed_red: f64,
    /// Mean of the IR smoothing window
    pub smoothed_ir: f64,
    pub normalized: NormalizedSignal,
    /// Last sampled die temperature (°C)
    pub temperature: f64,
    /// Motion proxy (0-1)
    pub motion: f64,
}

impl NodeReading {
    pub fn values(&self) -> SensorValues {
        SensorValues {
            red_signal: self.normalized.red,
            ir_signal: self.normalized.ir,
            temperature: self.temperature,
            motion: self.motion,
        }
    }

    /// Build the push body, including the debugging extras.
    pub fn to_request(&self, device_id: &str) -> SensorDataRequest {
        SensorDataRequest {
            device_id: Some(device_id.to_string()),
            raw_red: Some(self.smoothed_red.round() as i64),
            raw_ir: Some(self.smoothed_ir.round() as i64),
            timestamp: Some(self.raw.captured_at.as_secs()),
            ..SensorDataRequest::from(self.values())
        }
    }
}
