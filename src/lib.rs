//! Blinkband Monitor - optical wristband to glucose-trend dashboard.
//!
//! This library provides the pieces of a small demo pipeline: a sensor node
//! that smooths and normalizes pulse-oximeter counts, a server that turns
//! pushed signals into a synthetic glucose trend per data source, and a
//! polling client that renders the trend and tracks device liveness.
//!
//! The glucose value is a demonstration formula over optical, thermal and
//! motion inputs. It is not a medical measurement.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────┐        ┌──────────────────────┐
//! │   Acquisition node   │  push  │            Server            │  poll  │       Monitor        │
//! │ ┌────────┐ ┌───────┐ │ ─────▶ │ ┌────────────┐ ┌───────────┐ │ ◀───── │ ┌────────┐ ┌───────┐ │
//! │ │ Sensor │▶│Smooth │ │  2 s   │ │  Manager   │▶│  Glucose  │ │  1 s   │ │PollLoop│▶│Render │ │
//! │ └────────┘ └───────┘ │        │ │ (2 buffers)│ │ Synthesis │ │        │ └────────┘ └───────┘ │
//! └──────────────────────┘        │ └────────────┘ └───────────┘ │        │      Liveness        │
//!                                 └──────────────────────────────┘        └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use blinkband_monitor::server::{run, ServerConfig};
//! use blinkband_monitor::core::ManagerConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let (addr, shutdown) = run(ServerConfig::new(0, ManagerConfig::default())).await?;
//! println!("listening on {addr}");
//! let _ = shutdown.send(());
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod api;
pub mod client;
pub mod config;
pub mod core;
pub mod monitor;
pub mod server;
pub mod stats;

// Re-export key types at crate root for convenience
pub use acquisition::{AcquisitionError, AcquisitionNode, HttpUplink, NodeConfig, SimulatedSensor};
pub use api::{CurrentDataResponse, SensorDataRequest, StatusResponse, ValidationError};
pub use client::{ClientError, MonitorClient};
pub use config::{Config, ConfigError};
pub use core::{
    DataSource, DerivedRecord, GlucoseSynthesizer, LivenessMonitor, LivenessState, SensorValues,
    SourceBufferManager, YRange,
};
pub use monitor::{PollLoop, Renderer, TerminalRenderer};
pub use stats::{IngestStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
