//! Movement detection from consecutive accelerometer samples.
//!
//! Any axis that changes by more than `threshold` counts since the
//! previous sample means the animal moved. The first sample only seeds
//! the reference and reports no movement.

use log::debug;

use super::AccelSample;

pub struct MotionDetector {
    previous: Option<AccelSample>,
    threshold: u16,
}

impl MotionDetector {
    /// `threshold = 0` flags any change at all.
    pub const fn new(threshold: u16) -> Self {
        Self {
            previous: None,
            threshold,
        }
    }

    /// Feed a sample. Returns `true` if it differs from the previous one.
    pub fn update(&mut self, sample: AccelSample) -> bool {
        let moved = match self.previous {
            Some(prev) => prev.max_axis_delta(&sample) > self.threshold,
            None => false,
        };
        if moved {
            debug!("MOTION: {:?} -> {:?}", self.previous, sample);
        }
        self.previous = Some(sample);
        moved
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(0)
    }
}
