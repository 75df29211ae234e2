//! Board adapter: bridges the (simulated) peripherals to the port traits.
//!
//! Owns the clock, a synthetic GNSS receiver, the PMIC fuel gauge and the
//! accelerometer, and exposes them through [`Clock`] and [`SensorPort`].
//! Readings follow a deterministic walk so simulator runs are repeatable.

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;

use super::time::SystemClock;
use crate::app::ports::{Clock, SensorPort};
use crate::sensors::motion::MotionDetector;
use crate::sensors::{AccelSample, millivolts_to_volts};

/// Accelerometer counts below which a change is noise.
const MOTION_THRESHOLD: u16 = 40;

/// Degrees the simulated animal wanders per fix.
const WALK_STEP_DEG: f64 = 0.000_05;

pub struct SimBoard {
    clock: SystemClock,
    origin: (f64, f64),
    /// A new fix becomes ready every `fix_every` polls.
    fix_every: u32,
    polls: u32,
    fixes: u32,
    battery_mv: u16,
    motion: MotionDetector,
}

impl SimBoard {
    pub fn new(origin: (f64, f64), fix_every: u32) -> Self {
        Self {
            clock: SystemClock::new(),
            origin,
            fix_every: fix_every.max(1),
            polls: 0,
            fixes: 0,
            battery_mv: 4150,
            motion: MotionDetector::new(MOTION_THRESHOLD),
        }
    }

    /// Fixes produced so far.
    pub fn fixes(&self) -> u32 {
        self.fixes
    }

    fn accel_sample(&self) -> AccelSample {
        // Alternate rest and bursts of activity every few fixes.
        let active = (self.fixes / 3) % 2 == 1;
        let jitter = if active { (self.polls % 7) as i16 * 60 } else { 0 };
        AccelSample::new(jitter, -jitter / 2, 1000)
    }
}

impl Clock for SimBoard {
    fn now(&self) -> Instant {
        self.clock.now()
    }
}

impl DelayNs for SimBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.delay_ns(ns);
    }
}

impl SensorPort for SimBoard {
    fn battery_voltage(&mut self) -> f32 {
        self.battery_mv = self.battery_mv.saturating_sub(1).max(3300);
        millivolts_to_volts(self.battery_mv)
    }

    fn temperature_c(&mut self) -> f32 {
        24.0 + (self.fixes % 10) as f32 * 0.25
    }

    fn motion_detected(&mut self) -> bool {
        let sample = self.accel_sample();
        self.motion.update(sample)
    }

    fn poll_location(&mut self) -> Option<(f64, f64)> {
        self.polls = self.polls.wrapping_add(1);
        if self.polls % self.fix_every != 0 {
            return None;
        }
        self.fixes = self.fixes.wrapping_add(1);
        let step = f64::from(self.fixes) * WALK_STEP_DEG;
        Some((self.origin.0 + step, self.origin.1 - step / 2.0))
    }
}
