//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured tracker events through
//! the `log` facade (UART on the board, `tracing-subscriber` in the
//! simulator). A cloud-side sink would implement the same trait.

use log::{info, warn};

use crate::app::events::TrackerEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`TrackerEvent`].
#[derive(Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &TrackerEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            TrackerEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            TrackerEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            TrackerEvent::TelemetrySent { bearer, report } => {
                info!(
                    "TELEM | via={:?} | lat={:.6} lon={:.6} fresh={} | \
                     V={:.2} T={:.1}\u{00b0}C | moved={}",
                    bearer,
                    report.location.latitude,
                    report.location.longitude,
                    report.location.is_fresh,
                    report.battery_voltage,
                    report.temperature_c,
                    report.moved,
                );
            }
            TrackerEvent::PeerReplySent(reply) => {
                info!("PEER  | replied {}", reply.as_str());
            }
            TrackerEvent::CredentialsStored { slot } => {
                info!("CREDS | stored in slot {}", slot);
            }
            TrackerEvent::CredentialsDropped => {
                warn!("CREDS | store full, credential dropped");
            }
            TrackerEvent::ModemFailure(e) => {
                warn!("MODEM | {}", e);
            }
            TrackerEvent::ProtocolError(e) => {
                warn!("LINK  | {}", e);
            }
        }
    }
}
