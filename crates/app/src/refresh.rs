//! Refresh signal for headless runs.
//!
//! Without a display there is no presentation callback to wait for, so the
//! CLI paces refreshes on a monotonic clock at the export rate.

use std::time::{Duration, Instant};

/// Yields one timestamp (milliseconds since creation) per refresh interval,
/// sleeping until each interval has elapsed.
#[derive(Debug)]
pub struct PacedRefresh {
    epoch: Instant,
    interval: Duration,
    next_due: Instant,
}

impl PacedRefresh {
    pub fn new(hz: u32) -> Self {
        let epoch = Instant::now();
        let interval = Duration::from_secs(1) / hz.max(1);
        Self {
            epoch,
            interval,
            next_due: epoch + interval,
        }
    }

    /// Milliseconds elapsed since the signal was created.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }
}

impl Iterator for PacedRefresh {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let now = Instant::now();
        if now < self.next_due {
            std::thread::sleep(self.next_due - now);
        }
        // fall behind gracefully instead of bursting to catch up
        self.next_due = Instant::now().max(self.next_due) + self.interval;
        Some(self.now())
    }
}
