//! Dashboard-side polling and rendering.
//!
//! This module contains:
//! - The once-per-second poll loop and its liveness tracking
//! - The renderer seam and a plain terminal renderer

pub mod poll;
pub mod render;

// Re-export commonly used types
pub use poll::{PollConfig, PollLoop, PollSummary, SnapshotSource, TickOutcome};
pub use render::{sparkline, Renderer, TerminalRenderer};
