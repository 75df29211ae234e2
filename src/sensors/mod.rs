//! Sensor-side helpers that sit above raw register access.
//!
//! Register decoding for the accelerometer and the PMIC belongs to the
//! board adapter; this module only holds the logic that turns decoded
//! samples into the values a telemetry report carries.

pub mod motion;

/// One decoded accelerometer sample (raw counts per axis).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AccelSample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute per-axis difference to `other`.
    pub fn max_axis_delta(&self, other: &Self) -> u16 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        dx.max(dy).max(dz)
    }
}

/// Convert a PMIC fuel-gauge reading in millivolts to volts.
pub fn millivolts_to_volts(mv: u16) -> f32 {
    f32::from(mv) / 1000.0
}
