//! Host time adapter.
//!
//! Maps `std::time::Instant` onto the `embassy-time` [`Instant`] the core
//! uses for deadlines, and sleeps the calling thread for [`DelayNs`]. The
//! epoch is the moment the adapter was created.

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;

use crate::app::ports::Clock;

pub struct SystemClock {
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since creation (monotonic, saturates at `u64::MAX`).
    pub fn uptime_us(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.uptime_us())
    }
}

impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
