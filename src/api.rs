//! JSON wire types shared by the server and its clients.
//!
//! Field names match what the sensor firmware and the browser dashboard
//! already send and read, so they must not be renamed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::core::buffer::{DerivedRecord, YRange};
use crate::core::source::{DataSource, SensorValues};
use crate::stats::StatsSnapshot;

/// A request body that cannot be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {0} must be a finite number")]
    NonFinite(&'static str),

    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("No sensor field supplied")]
    EmptyUpdate,

    #[error("Unknown data source: {0}")]
    UnknownSource(String),

    #[error("Malformed body: {0}")]
    Malformed(String),
}

fn require(value: Option<f64>, field: &'static str) -> Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    check_value(value, field)
}

fn check_value(value: f64, field: &'static str) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    let unit = matches!(field, "red_signal" | "ir_signal" | "motion");
    if unit && !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::OutOfRange { field, value });
    }
    Ok(value)
}

/// POST /api/sensor-data body, as pushed by the acquisition node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorDataRequest {
    pub red_signal: Option<f64>,
    pub ir_signal: Option<f64>,
    pub temperature: Option<f64>,
    pub motion: Option<f64>,
    // Informational extras; a value of another type is dropped, never rejected.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub raw_red: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub raw_ir: Option<i64>,
    /// Seconds since the node booted
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl SensorDataRequest {
    /// All four signal fields must be present and in range.
    pub fn validate(&self) -> Result<SensorValues, ValidationError> {
        Ok(SensorValues {
            red_signal: require(self.red_signal, "red_signal")?,
            ir_signal: require(self.ir_signal, "ir_signal")?,
            temperature: require(self.temperature, "temperature")?,
            motion: require(self.motion, "motion")?,
        })
    }
}

impl From<SensorValues> for SensorDataRequest {
    fn from(values: SensorValues) -> Self {
        Self {
            red_signal: Some(values.red_signal),
            ir_signal: Some(values.ir_signal),
            temperature: Some(values.temperature),
            motion: Some(values.motion),
            ..Default::default()
        }
    }
}

/// POST /api/update-sensors body; any subset of fields, at least one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSensorsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_signal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ir_signal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<f64>,
}

impl UpdateSensorsRequest {
    /// Overlay the supplied fields on `current`.
    pub fn apply(&self, current: SensorValues) -> Result<SensorValues, ValidationError> {
        if self.red_signal.is_none()
            && self.ir_signal.is_none()
            && self.temperature.is_none()
            && self.motion.is_none()
        {
            return Err(ValidationError::EmptyUpdate);
        }

        let mut next = current;
        if let Some(v) = self.red_signal {
            next.red_signal = check_value(v, "red_signal")?;
        }
        if let Some(v) = self.ir_signal {
            next.ir_signal = check_value(v, "ir_signal")?;
        }
        if let Some(v) = self.temperature {
            next.temperature = check_value(v, "temperature")?;
        }
        if let Some(v) = self.motion {
            next.motion = check_value(v, "motion")?;
        }
        Ok(next)
    }
}

/// POST /api/set-data-source body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetSourceRequest {
    pub data_source: Option<String>,
}

impl SetSourceRequest {
    pub fn source(&self) -> Result<DataSource, ValidationError> {
        self.data_source
            .as_deref()
            .ok_or(ValidationError::MissingField("data_source"))?
            .parse()
    }
}

/// POST /api/clear-buffer body; a missing name means the active source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearBufferRequest {
    #[serde(default)]
    pub buffer_name: Option<String>,
}

/// Generic `{status, message}` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data_source: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data_source: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Sensor block of the poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub red_signal: f64,
    pub ir_signal: f64,
    pub temperature: f64,
    pub motion: f64,
    pub device_connected: bool,
    /// RFC 3339 time of the last ingest for the active source
    pub last_update: Option<String>,
}

impl SensorSnapshot {
    pub fn values(&self) -> SensorValues {
        SensorValues {
            red_signal: self.red_signal,
            ir_signal: self.ir_signal,
            temperature: self.temperature,
            motion: self.motion,
        }
    }
}

/// GET /api/get-current-data response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentDataResponse {
    pub status: String,
    pub sensor_values: SensorSnapshot,
    pub glucose_data: Vec<DerivedRecord>,
    pub y_range: YRange,
    pub data_source: DataSource,
    pub data_count: usize,
    /// Server wall-clock label (HH:MM:SS)
    pub timestamp: String,
}

/// GET /health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub stats: StatsSnapshot,
}
