//! Time utilities for the client tick loop

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Tick rate configuration
pub const DEFAULT_FRAME_RATE: u32 = 60; // render frames per second
pub const DEFAULT_SEND_RATE: u32 = 60; // outbound state reports per second

/// Largest integration step accepted by the simulation (seconds)
pub const MAX_FRAME_DELTA: f64 = 1.0 / 30.0;

/// Clamp a raw frame delta to the simulation's worst-case step.
/// Negative or NaN deltas (clock hiccups) become zero.
pub fn clamp_delta(raw_dt: f64) -> f64 {
    if raw_dt.is_nan() {
        return 0.0;
    }
    raw_dt.clamp(0.0, MAX_FRAME_DELTA)
}

/// Milliseconds elapsed from `since` to `now`, zero if the clock went backwards
pub fn elapsed_ms(now: u64, since: u64) -> u64 {
    now.saturating_sub(since)
}
