//! Telemetry tick flag and its software driver.
//!
//! [`TickFlag`] is the only state a timer interrupt touches: it raises the
//! flag, and the foreground loop takes it. On hosts (and in tests) a
//! [`PeriodicTimer`] raises the flag from `Instant` comparisons instead.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::{Duration, Instant};

/// Interrupt-safe "telemetry due" flag.
pub struct TickFlag(AtomicBool);

impl TickFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Set the flag (timer callback side).
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear the flag (foreground side).
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for TickFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Software periodic timer raising a [`TickFlag`].
pub struct PeriodicTimer<'f> {
    flag: &'f TickFlag,
    period: Duration,
    next_fire: Option<Instant>,
}

impl<'f> PeriodicTimer<'f> {
    pub fn new(flag: &'f TickFlag) -> Self {
        Self {
            flag,
            period: Duration::from_secs(0),
            next_fire: None,
        }
    }

    /// Arm the timer. The first expiry is immediate.
    pub fn start(&mut self, now: Instant, period: Duration) {
        self.period = period;
        self.next_fire = Some(now);
    }

    pub fn stop(&mut self) {
        self.next_fire = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_fire.is_some()
    }

    pub fn flag(&self) -> &'f TickFlag {
        self.flag
    }

    /// Raise the flag if the deadline passed. Missed periods collapse into
    /// one expiry.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_fire else {
            return false;
        };
        if now < due {
            return false;
        }
        let mut next = due + self.period;
        if next <= now {
            next = now + self.period;
        }
        self.next_fire = Some(next);
        self.flag.raise();
        true
    }
}
