//! Server-side signal fusion and client-side liveness.
//!
//! This module contains:
//! - Data sources and their latest sensor values
//! - The glucose synthesizer and its noise source
//! - Bounded per-source buffers and the manager that owns them
//! - The connection liveness state machine

pub mod buffer;
pub mod glucose;
pub mod liveness;
pub mod manager;
pub mod source;

// Re-export commonly used types
pub use buffer::{DerivedRecord, RangePolicy, SourceBuffer, YRange, DEFAULT_CAPACITY};
pub use glucose::{minute_of_day, GlucoseSynthesizer, GlucoseTerms, NoiseSource, SynthConfig};
pub use liveness::{classify, LivenessMonitor, LivenessState, LivenessThresholds};
pub use manager::{IngestEvent, LivenessRecord, ManagerConfig, SourceBufferManager, SourceView};
pub use source::{DataSource, SensorValues};
