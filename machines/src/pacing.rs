//! Real-time pacing: hold emulated time to wall-clock time.
//!
//! The run loop reports T-states as it executes them; [`Pacer::pace`]
//! sleeps until wall time has caught up with emulated time. A host that
//! falls behind by more than a frame does not try to catch up in a burst;
//! the baseline moves forward instead.

use std::time::{Duration, Instant};

use tracing::debug;

pub struct Pacer {
    clock_hz: u64,
    state_duration: Duration,
    max_lag: Duration,
    start: Instant,
    t_states: u64,
}

impl Pacer {
    pub fn new(clock_hz: u32, frame_rate: u32) -> Self {
        let clock_hz = clock_hz.max(1);
        let frame_rate = frame_rate.max(1);
        Self {
            clock_hz: clock_hz as u64,
            state_duration: Duration::from_secs(1) / clock_hz,
            max_lag: Duration::from_secs(1) / frame_rate,
            start: Instant::now(),
            t_states: 0,
        }
    }

    /// Wall-clock length of one T-state.
    pub fn state_duration(&self) -> Duration {
        self.state_duration
    }

    /// T-states executed since the baseline.
    pub fn t_states(&self) -> u64 {
        self.t_states
    }

    pub fn add(&mut self, t_states: u32) {
        self.t_states += t_states as u64;
    }

    /// Emulated time since the baseline.
    pub fn target(&self) -> Duration {
        let nanos = self.t_states as u128 * 1_000_000_000 / self.clock_hz as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Sleep until wall time reaches emulated time and return how long
    /// was slept.
    pub fn pace(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        let target = self.target();
        if elapsed > target + self.max_lag {
            debug!(lag_ms = (elapsed - target).as_millis() as u64, "pacer fell behind, resetting");
            self.rebase();
            return Duration::ZERO;
        }
        let wait = target.saturating_sub(elapsed);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        wait
    }

    /// Start counting again from now.
    pub fn rebase(&mut self) {
        self.start = Instant::now();
        self.t_states = 0;
    }
}
