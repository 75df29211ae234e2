//! Test doubles shared by unit tests.

use core::cell::Cell;
use std::collections::HashMap;

use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;

use crate::app::ports::{Clock, SensorPort, StorageError, StoragePort};

/// A clock that only moves when something sleeps on it.
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_secs(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl DelayNs for ManualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(Duration::from_millis(u64::from(ms)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Manual clock plus fixed sensor readings and a scripted fix.
pub struct TestBoard {
    pub clock: ManualClock,
    pub battery: f32,
    pub temperature: f32,
    pub moving: bool,
    pub next_fix: Option<(f64, f64)>,
}

impl TestBoard {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(),
            battery: 3.9,
            temperature: 21.0,
            moving: false,
            next_fix: None,
        }
    }
}

impl DelayNs for TestBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

impl Clock for TestBoard {
    fn now(&self) -> Instant {
        self.clock.now()
    }
}

impl SensorPort for TestBoard {
    fn battery_voltage(&mut self) -> f32 {
        self.battery
    }

    fn temperature_c(&mut self) -> f32 {
        self.temperature
    }

    fn motion_detected(&mut self) -> bool {
        self.moving
    }

    fn poll_location(&mut self) -> Option<(f64, f64)> {
        self.next_fix.take()
    }
}

/// In-memory block storage.
#[derive(Default)]
pub struct MemStorage(pub HashMap<u16, std::vec::Vec<u8>>);

impl StoragePort for MemStorage {
    fn read(&self, index: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self.0.get(&index).ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, index: u16, data: &[u8]) -> Result<(), StorageError> {
        self.0.insert(index, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, index: u16) -> Result<(), StorageError> {
        self.0.remove(&index);
        Ok(())
    }

    fn exists(&self, index: u16) -> bool {
        self.0.contains_key(&index)
    }
}
