//! Port traits: the hexagonal boundary between session logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TrackerService (domain)
//! ```
//!
//! Driven adapters (clock, sensors, storage, peer link, event sinks)
//! implement these traits. [`TrackerService`](super::service::TrackerService)
//! takes them as generics at call sites, so the domain never touches a
//! peripheral directly.
//!
//! The modem TX side is the plain [`Transport`]; its RX side arrives as
//! lines on a [`FrameQueue`](crate::link::channels::FrameQueue).

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;

use crate::config::TrackerConfig;
use crate::link::transport::Transport;

/// Logical storage index of the persisted configuration block.
pub const CONFIG_INDEX: u16 = 1;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time plus the ability to sleep.
///
/// The AT engine derives every deadline from `now()` and sleeps between
/// polls through [`DelayNs`]; nothing in the core reads a global clock.
pub trait Clock: DelayNs {
    fn now(&self) -> Instant;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: board → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the values a telemetry report carries.
pub trait SensorPort {
    /// Battery voltage from the PMIC fuel gauge (volts).
    fn battery_voltage(&mut self) -> f32;

    /// Charger die temperature (°C).
    fn temperature_c(&mut self) -> f32;

    /// Whether the accelerometer saw movement since the previous call.
    fn motion_detected(&mut self) -> bool;

    /// Latest GNSS fix as `(latitude, longitude)`, if a new one is ready.
    fn poll_location(&mut self) -> Option<(f64, f64)>;
}

// ───────────────────────────────────────────────────────────────
// Peer link port (driven adapter: domain ↔ companion MCU)
// ───────────────────────────────────────────────────────────────

/// TX half of the inter-MCU bridge plus the BLE connection state.
pub trait PeerLink: Transport {
    /// Whether the companion currently holds a BLE connection to the app.
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`TrackerEvent`](super::events::TrackerEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::TrackerEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`TrackerConfig`].
///
/// Implementations MUST validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Returns [`TrackerConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<TrackerConfig, ConfigError>;

    fn save(&self, config: &TrackerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Index-addressed blob storage.
///
/// Writes MUST be atomic per block: a power loss leaves either the old or
/// the new block, never a mix.
pub trait StoragePort {
    /// Read a block. Returns the number of bytes written to `buf`.
    fn read(&self, index: u16, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace a block atomically.
    fn write(&mut self, index: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a block. Returns `Ok(())` even if it didn't exist.
    fn delete(&mut self, index: u16) -> Result<(), StorageError>;

    fn exists(&self, index: u16) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "block not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
