//! Data sources and the sensor values each one carries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::ValidationError;

/// A stream of samples the server keeps a buffer for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Values typed in from the dashboard sliders.
    #[default]
    Manual,
    /// Values pushed by the sensor node.
    Esp32,
}

impl DataSource {
    pub const ALL: [DataSource; 2] = [DataSource::Manual, DataSource::Esp32];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Manual => "manual",
            DataSource::Esp32 => "esp32",
        }
    }

    /// Whether samples for this source come from remote hardware.
    pub fn is_remote(&self) -> bool {
        matches!(self, DataSource::Esp32)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            DataSource::Manual => 0,
            DataSource::Esp32 => 1,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(DataSource::Manual),
            "esp32" => Ok(DataSource::Esp32),
            other => Err(ValidationError::UnknownSource(other.to_string())),
        }
    }
}

/// Latest normalized inputs for one source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorValues {
    /// Normalized red channel (0-1)
    pub red_signal: f64,
    /// Normalized IR channel (0-1)
    pub ir_signal: f64,
    /// Temperature in °C
    pub temperature: f64,
    /// Motion proxy (0-1)
    pub motion: f64,
}

impl Default for SensorValues {
    fn default() -> Self {
        Self {
            red_signal: 0.6,
            ir_signal: 0.7,
            temperature: 36.5,
            motion: 0.3,
        }
    }
}
