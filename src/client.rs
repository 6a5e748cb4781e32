//! HTTP client for the monitor server's dashboard endpoints.
//!
//! Used by the terminal poll loop and by anything that needs to drive the
//! server remotely (switch source, clear a buffer, move a manual slider).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::api::{
    ClearBufferRequest, CurrentDataResponse, HealthResponse, SetSourceRequest, StatusResponse,
    UpdateSensorsRequest,
};
use crate::core::DataSource;

/// Client error types.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network/HTTP error
    #[error("Monitor network error: {0}")]
    Network(String),

    /// Server returned an error response
    #[error("Monitor server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body did not decode
    #[error("Monitor serialization error: {0}")]
    Serialization(String),
}

/// Client for one monitor server.
pub struct MonitorClient {
    base_url: String,
    client: reqwest::Client,
}

impl MonitorClient {
    /// Create a new client for `base_url` (e.g. `http://127.0.0.1:5000`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            // Error bodies are usually {status, message}.
            let message = serde_json::from_str::<StatusResponse>(&body)
                .map(|r| r.message)
                .unwrap_or(body);
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Self::decode(response).await
    }

    /// GET /health
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/health").await
    }

    /// GET /api/get-current-data
    pub async fn current_data(&self) -> Result<CurrentDataResponse, ClientError> {
        self.get("/api/get-current-data").await
    }

    /// POST /api/set-data-source
    pub async fn set_source(&self, source: DataSource) -> Result<StatusResponse, ClientError> {
        let body = SetSourceRequest {
            data_source: Some(source.to_string()),
        };
        self.post("/api/set-data-source", &body).await
    }

    /// POST /api/clear-buffer; `None` clears the active source.
    pub async fn clear_buffer(
        &self,
        source: Option<DataSource>,
    ) -> Result<StatusResponse, ClientError> {
        let body = ClearBufferRequest {
            buffer_name: source.map(|s| s.to_string()),
        };
        self.post("/api/clear-buffer", &body).await
    }

    /// POST /api/update-sensors
    pub async fn update_sensors(
        &self,
        update: &UpdateSensorsRequest,
    ) -> Result<StatusResponse, ClientError> {
        self.post("/api/update-sensors", update).await
    }

    /// GET /api/download-csv as text.
    pub async fn download_csv(&self) -> Result<String, ClientError> {
        let response = self
            .client
            .get(self.url("/api/download-csv"))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if !status.is_success() {
            let message = serde_json::from_str::<StatusResponse>(&body)
                .map(|r| r.message)
                .unwrap_or(body);
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}
