//! Time and tick-rate constants for the frame loop

use std::time::Duration;

/// Host frame callbacks per second (the engine's server frame rate)
pub const FRAME_TPS: u32 = 64;

/// Seconds of world time between expensive resolve passes
pub const RESOLVE_INTERVAL_SECS: f64 = 0.1;

/// Duration of one host frame
pub fn frame_duration() -> Duration {
    Duration::from_micros(1_000_000 / FRAME_TPS as u64)
}
