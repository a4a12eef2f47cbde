//! Time utilities for the match clock

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// How often the room advances the match clock
pub const ROOM_TICK_HZ: u64 = 10;

/// Client simulation rate
pub const SIMULATION_HZ: u64 = 60;
/// One simulation frame in milliseconds
pub const FRAME_MS: f64 = 1000.0 / SIMULATION_HZ as f64;
/// Longest frame delta the client will integrate at once
pub const MAX_FRAME_DELTA_MS: f64 = 250.0;

/// Fixed-step accumulator for a variable-rate driver
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    accumulated_ms: f64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta_ms` of wall time and return how many whole frames to run
    ///
    /// Negative or non-finite deltas count as zero and long stalls are
    /// clamped so a paused tab does not replay seconds of physics.
    pub fn advance(&mut self, delta_ms: f64) -> u32 {
        let delta = if delta_ms.is_finite() {
            delta_ms.clamp(0.0, MAX_FRAME_DELTA_MS)
        } else {
            0.0
        };
        self.accumulated_ms += delta;

        let mut frames = 0;
        while self.accumulated_ms >= FRAME_MS {
            self.accumulated_ms -= FRAME_MS;
            frames += 1;
        }
        frames
    }

    /// Fraction of a frame left over, for render interpolation
    pub fn alpha(&self) -> f64 {
        self.accumulated_ms / FRAME_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_accumulates() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(10.0), 0);
        assert_eq!(clock.advance(10.0), 1);
        assert!(clock.alpha() > 0.0 && clock.alpha() < 1.0);
        assert_eq!(clock.advance(FRAME_MS * 3.0), 3);
    }

    #[test]
    fn test_frame_clock_guards_bad_deltas() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(-50.0), 0);
        assert_eq!(clock.advance(f64::NAN), 0);
        assert_eq!(clock.advance(0.0), 0);
        // A 10 s stall counts as the maximum delta
        let mut fresh = FrameClock::new();
        let frames = clock.advance(10_000.0);
        assert_eq!(frames, fresh.advance(MAX_FRAME_DELTA_MS));
        assert!(frames <= 15);
    }

    #[test]
    fn test_uptime_starts_at_zero() {
        init_server_time();
        assert!(uptime_secs() < 5);
    }
}
