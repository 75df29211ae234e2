//! Location snapshot and telemetry payload rendering.
//!
//! The snapshot is written by the location poll and consumed by a
//! successful send; a report is gathered just before each publish so the
//! battery and temperature readings are never older than the send itself.

use core::fmt::Write;

use heapless::String;

use crate::app::ports::SensorPort;

/// Capacity of one rendered payload; matches the frame payload capacity.
pub const PAYLOAD_CAPACITY: usize = 100;

pub type Payload = String<PAYLOAD_CAPACITY>;

/// Last known position plus a "not yet sent" bit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub is_fresh: bool,
}

impl LocationSnapshot {
    /// Record a new fix and mark it fresh.
    pub fn update(&mut self, latitude: f64, longitude: f64) {
        self.latitude = latitude;
        self.longitude = longitude;
        self.is_fresh = true;
    }

    /// Mark the current fix as sent.
    pub fn consume(&mut self) {
        self.is_fresh = false;
    }
}

/// Everything one telemetry message carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReport {
    pub location: LocationSnapshot,
    pub battery_voltage: f32,
    pub temperature_c: f32,
    pub moved: bool,
}

impl TelemetryReport {
    /// Read the auxiliary sensors and combine them with `location`.
    pub fn gather(location: LocationSnapshot, sensors: &mut impl SensorPort) -> Self {
        Self {
            location,
            battery_voltage: sensors.battery_voltage(),
            temperature_c: sensors.temperature_c(),
            moved: sensors.motion_detected(),
        }
    }

    fn write_common(&self, out: &mut Payload) -> core::fmt::Result {
        write!(
            out,
            "{:.6}/{:.6}/VC:{:.2}/TC:{:.2}",
            self.location.latitude, self.location.longitude, self.battery_voltage, self.temperature_c
        )
    }

    /// Cloud payload: `lat/lon/VC:v/TC:t`.
    pub fn wifi_payload(&self) -> Option<Payload> {
        let mut out = Payload::new();
        self.write_common(&mut out).ok()?;
        Some(out)
    }

    /// Peer payload: the cloud payload plus `/PetMov:0|1`.
    pub fn ble_payload(&self) -> Option<Payload> {
        let mut out = Payload::new();
        self.write_common(&mut out).ok()?;
        write!(out, "/PetMov:{}", u8::from(self.moved)).ok()?;
        Some(out)
    }
}
