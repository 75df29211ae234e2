//! Outbound application events.
//!
//! [`TrackerService`](super::service::TrackerService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, count them in a test,
//! forward them to a diagnostics channel.

use crate::error::{AtError, FrameError};
use crate::fsm::StateId;
use crate::fsm::context::Bearer;
use crate::telemetry::TelemetryReport;

use super::commands::PeerReply;

/// Structured events emitted by the tracker core.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The service started (carries the initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A telemetry report left over `bearer`.
    TelemetrySent {
        bearer: Bearer,
        report: TelemetryReport,
    },

    /// A handshake reply was written to the companion.
    PeerReplySent(PeerReply),

    /// A credential was stored (and persisted) in `slot`.
    CredentialsStored { slot: usize },

    /// A credential was dropped because every slot holds another SSID.
    CredentialsDropped,

    /// A modem command or sequence failed.
    ModemFailure(AtError),

    /// A peer frame could not be decoded.
    ProtocolError(FrameError),
}
