//! Outbound link from the acquisition node to the fusion server.

use std::time::Duration;
use thiserror::Error;

use crate::api::SensorDataRequest;

/// A push that did not reach the server.
#[derive(Debug, Clone, Error)]
pub enum UplinkError {
    #[error("Uplink not connected")]
    NotConnected,

    #[error("Uplink network error: {0}")]
    Network(String),

    #[error("Server rejected push ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Fire-and-forget transport for sensor pushes.
#[allow(async_fn_in_trait)]
pub trait Uplink {
    /// One connection attempt.
    async fn connect(&mut self) -> bool;

    fn is_connected(&self) -> bool;

    /// Send one push. Failures are reported, never retried here.
    async fn push(&mut self, body: &SensorDataRequest) -> Result<(), UplinkError>;
}

/// HTTP uplink posting to `/api/sensor-data`.
pub struct HttpUplink {
    base_url: String,
    client: reqwest::Client,
    connected: bool,
}

impl HttpUplink {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            connected: false,
        }
    }

    pub fn sensor_data_url(&self) -> String {
        format!("{}/api/sensor-data", self.base_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

impl Uplink for HttpUplink {
    async fn connect(&mut self) -> bool {
        self.connected = match self.client.get(self.health_url()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        };
        self.connected
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn push(&mut self, body: &SensorDataRequest) -> Result<(), UplinkError> {
        let response = self
            .client
            .post(self.sensor_data_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    self.connected = false;
                }
                UplinkError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UplinkError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let uplink = HttpUplink::new("http://127.0.0.1:5000/");
        assert_eq!(uplink.sensor_data_url(), "http://127.0.0.1:5000/api/sensor-data");
        assert_eq!(uplink.health_url(), "http://127.0.0.1:5000/health");
        assert!(!uplink.is_connected());
    }
}
