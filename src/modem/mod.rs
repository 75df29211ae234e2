//! Line-oriented modem control.
//!
//! ```text
//!   CommandTable ──▶ AtEngine::configure_all ──▶ Transport (UART TX)
//!                         ▲
//!                         │ lines
//!   UART RX ──▶ FrameReceiver(Line) ──▶ FrameQueue
//!                         │
//!                         └── unrelated lines ──▶ classify_unsolicited
//! ```
//!
//! The engine only knows commands, classifiers and deadlines. The response
//! tokens below are the DA16200 dialect; another modem needs a different
//! command table, not a different engine.

pub mod command;
pub mod engine;
pub mod events;

/// Generic success line.
pub const OK: &str = "OK";
/// Generic failure line.
pub const NEGATIVE: &str = "ERROR";
/// Access point joined.
pub const JOINED: &str = "+WFJAP:1";
/// Access point join failed.
pub const JOIN_FAILED: &str = "+WFJAP:0";
/// Station associated (status query reply).
pub const STATION_UP: &str = "+WFSTA:1";
/// Station not associated (status query reply).
pub const STATION_DOWN: &str = "+WFSTA:0";
/// Association lost.
pub const DROPPED: &str = "+WFDAP:0";
