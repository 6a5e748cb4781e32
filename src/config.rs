//! Configuration for the server, the acquisition node and the monitor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::acquisition::NodeConfig;
use crate::core::{LivenessThresholds, ManagerConfig, RangePolicy, SynthConfig, DEFAULT_CAPACITY};

/// Main configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub buffer: BufferSettings,
    pub glucose: SynthConfig,
    pub node: NodeConfig,
    pub monitor: MonitorSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// A device counts as connected while its last push is younger than this
    #[serde(with = "duration_serde")]
    pub connected_window: Duration,
    /// Minimum spacing of poll-driven manual records
    #[serde(with = "duration_ms_serde")]
    pub manual_tick: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            connected_window: Duration::from_secs(10),
            manual_tick: Duration::from_secs(1),
        }
    }
}

/// Per-source buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Records kept per source
    pub capacity: usize,
    /// Y-axis derivation
    pub range: RangePolicy,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            range: RangePolicy::default(),
        }
    }
}

/// Poll/render loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Server base URL to poll
    pub server_url: String,
    #[serde(with = "duration_ms_serde")]
    pub poll_interval: Duration,
    /// Below this age the device counts as recently seen
    pub recent_threshold_secs: u64,
    /// Below this age the device counts as lost
    pub lost_threshold_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            poll_interval: Duration::from_secs(1),
            recent_threshold_secs: 15,
            lost_threshold_secs: 60,
        }
    }
}

impl MonitorSettings {
    pub fn thresholds(&self) -> LivenessThresholds {
        LivenessThresholds::from_secs(self.recent_threshold_secs, self.lost_threshold_secs)
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blinkband")
            .join("config.json")
    }

    /// Buffer-manager settings derived from this configuration.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            capacity: self.buffer.capacity,
            range: self.buffer.range.clone(),
            connected_window: to_chrono(self.server.connected_window),
            manual_tick: to_chrono(self.server.manual_tick),
            synth: self.glucose.clone(),
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serde support for Duration as whole seconds.
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
pub mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.buffer.capacity, 30);
        assert_eq!(config.node.push_interval, Duration::from_secs(2));
        assert_eq!(config.node.sample_interval, Duration::from_millis(100));
        assert_eq!(config.monitor.poll_interval, Duration::from_secs(1));
        assert_eq!(config.monitor.thresholds(), LivenessThresholds::default());
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let json = r#"{"server":{"port":8080},"node":{"push_interval":500},"glucose":{"timezone":"Asia/Jakarta"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.node.push_interval, Duration::from_millis(500));
        assert_eq!(config.glucose.timezone, "Asia/Jakarta");
        assert_eq!(config.glucose.baseline, 110.0);
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let path = std::env::temp_dir()
            .join(format!("blinkband-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let mut config = Config::default();
        config.server.port = 6123;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 6123);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("blinkband-does-not-exist.json");
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_manager_config_conversion() {
        let manager = Config::default().manager_config();
        assert_eq!(manager.connected_window, chrono::Duration::seconds(10));
        assert_eq!(manager.manual_tick, chrono::Duration::seconds(1));
        assert_eq!(manager.capacity, 30);
    }
}
