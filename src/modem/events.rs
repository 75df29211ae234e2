//! Unsolicited modem lines.

use super::{DROPPED, JOIN_FAILED, JOINED};

/// Asynchronous association news from the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemEvent {
    Associated,
    AssociationFailed,
    Disassociated,
}

/// Map a line that answered no command to an event, if it means one.
pub fn classify_unsolicited(line: &str) -> Option<ModemEvent> {
    if line.contains(JOINED) {
        Some(ModemEvent::Associated)
    } else if line.contains(JOIN_FAILED) {
        Some(ModemEvent::AssociationFailed)
    } else if line.contains(DROPPED) {
        Some(ModemEvent::Disassociated)
    } else {
        None
    }
}
