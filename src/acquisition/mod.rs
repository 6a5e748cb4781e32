//! Sensor-node side of the pipeline.
//!
//! Raw optical counts are smoothed over a ten-slot window, normalized into
//! [0, 1] and pushed to the server at a fixed cadence. Temperature is read at
//! a slower cadence and motion is estimated from IR variation.

pub mod node;
pub mod sensor;
pub mod smoothing;
pub mod types;
pub mod uplink;

// Re-export commonly used types
pub use node::{
    default_device_id, AcquisitionError, AcquisitionNode, NodeConfig, NodeState, NodeSummary,
    PushOutcome, TickOutcome,
};
pub use sensor::{OpticalSensor, SimulatedSensor, SimulatedSensorConfig};
pub use smoothing::{
    ChannelDomain, MotionEstimator, SmoothingBuffer, IR_DOMAIN, RED_DOMAIN, SMOOTHING_SAMPLES,
};
pub use types::{NodeReading, NormalizedSignal, RawSample};
pub use uplink::{HttpUplink, Uplink, UplinkError};
