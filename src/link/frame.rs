//! Fixed-layout inter-MCU frame codec.
//!
//! Wire format (105 bytes, always the same size):
//! ```text
//! ┌──────┬──────┬─────────────────────────┬────────────┬──────┐
//! │ 0x2A │ type │ payload (100 B, padded) │ len u16 LE │ 0x23 │
//! └──────┴──────┴─────────────────────────┴────────────┴──────┘
//! ```
//!
//! `type` is one of CMD=0, RESP=1, DATA=2, ACK=3. The receiver strips the
//! two sentinels, so the foreground loop sees the 103-byte *body* and calls
//! [`decode_received`]. The peer firmware also sends bare text commands
//! such as `*CONNECT#`; those bodies start with a printable byte and are
//! decoded as CMD frames carrying the text.

use heapless::Vec;
use log::{debug, warn};

use crate::error::FrameError;

/// Start sentinel (`*`).
pub const START_MARKER: u8 = 0x2A;

/// End sentinel (`#`).
pub const END_MARKER: u8 = 0x23;

/// Maximum payload bytes carried by one frame.
pub const PAYLOAD_CAPACITY: usize = 100;

/// Bytes between the sentinels: type + payload + length.
pub const BODY_LEN: usize = 1 + PAYLOAD_CAPACITY + 2;

/// Whole frame including sentinels.
pub const FRAME_LEN: usize = BODY_LEN + 2;

/// Body bytes below this value are binary type codes, never text.
const FIRST_PRINTABLE: u8 = 0x20;

// ---------------------------------------------------------------------------
// Message type
// ---------------------------------------------------------------------------

/// Frame discriminant.
///
/// Unknown codes are kept rather than rejected so that [`dispatch`] can log
/// and ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Command,
    Response,
    Data,
    Ack,
    Unknown(u8),
}

impl MessageType {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Command,
            1 => Self::Response,
            2 => Self::Data,
            3 => Self::Ack,
            other => Self::Unknown(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Command => 0,
            Self::Response => 1,
            Self::Data => 2,
            Self::Ack => 3,
            Self::Unknown(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One decoded (or ready-to-send) inter-MCU message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    message_type: MessageType,
    payload: Vec<u8, PAYLOAD_CAPACITY>,
}

impl Frame {
    /// Copy `payload` into a new frame.
    pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|()| FrameError::PayloadTooLarge {
            len: payload.len(),
        })?;
        Ok(Self {
            message_type,
            payload,
        })
    }

    /// Convenience: a CMD frame carrying `text`.
    pub fn command(text: &str) -> Result<Self, FrameError> {
        Self::encode(MessageType::Command, text.as_bytes())
    }

    /// Convenience: a RESP frame carrying `text`.
    pub fn response(text: &str) -> Result<Self, FrameError> {
        Self::encode(MessageType::Response, text.as_bytes())
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// Payload as UTF-8 text.
    pub fn text(&self) -> Result<&str, FrameError> {
        core::str::from_utf8(&self.payload).map_err(|_| FrameError::NotText)
    }

    /// Serialise to the fixed wire layout. Unused payload bytes are zero.
    pub fn to_wire(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0] = START_MARKER;
        out[1] = self.message_type.code();
        out[2..2 + self.payload.len()].copy_from_slice(&self.payload);
        let len_at = 2 + PAYLOAD_CAPACITY;
        out[len_at..len_at + 2].copy_from_slice(&self.payload_len().to_le_bytes());
        out[FRAME_LEN - 1] = END_MARKER;
        out
    }
}

/// Build a frame; fails with `PayloadTooLarge` beyond [`PAYLOAD_CAPACITY`].
pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Frame, FrameError> {
    Frame::encode(message_type, payload)
}

/// Decode a complete wire frame including both sentinels.
pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < FRAME_LEN {
        return Err(FrameError::Truncated { len: raw.len() });
    }
    if raw[0] != START_MARKER || raw[FRAME_LEN - 1] != END_MARKER {
        return Err(FrameError::BadMarker);
    }
    decode_body(&raw[1..FRAME_LEN - 1])
}

/// Decode a sentinel-stripped binary body (`type + payload + len`).
pub fn decode_body(body: &[u8]) -> Result<Frame, FrameError> {
    if body.len() < BODY_LEN {
        return Err(FrameError::Truncated { len: body.len() });
    }
    let len_at = 1 + PAYLOAD_CAPACITY;
    let declared = u16::from_le_bytes([body[len_at], body[len_at + 1]]);
    if declared as usize > PAYLOAD_CAPACITY {
        return Err(FrameError::BadLength(declared));
    }
    Frame::encode(
        MessageType::from_code(body[0]),
        &body[1..1 + declared as usize],
    )
}

/// Decode whatever the inter-MCU receiver delivered: a binary body or a
/// bare text command.
pub fn decode_received(body: &[u8]) -> Result<Frame, FrameError> {
    match body.first() {
        None => Err(FrameError::Truncated { len: 0 }),
        Some(&b) if b < FIRST_PRINTABLE => decode_body(body),
        Some(_) => Frame::encode(MessageType::Command, body),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Per-type frame handlers. DATA and ACK carry nothing the core acts on.
pub trait FrameHandler {
    fn on_command(&mut self, text: &str);
    fn on_response(&mut self, text: &str);
    fn on_data(&mut self, _payload: &[u8]) {}
    fn on_ack(&mut self, _payload: &[u8]) {}
}

/// Route `frame` to exactly one handler method.
///
/// Returns `false` when no handler ran (unknown type or non-text payload on
/// a text-bearing type); the frame is logged and dropped.
pub fn dispatch(frame: &Frame, handler: &mut impl FrameHandler) -> bool {
    match frame.message_type() {
        MessageType::Command | MessageType::Response => {
            let Ok(text) = frame.text() else {
                warn!("LINK: dropping {:?} frame with non-text payload", frame.message_type());
                return false;
            };
            if frame.message_type() == MessageType::Command {
                handler.on_command(text);
            } else {
                handler.on_response(text);
            }
            true
        }
        MessageType::Data => {
            handler.on_data(frame.payload());
            true
        }
        MessageType::Ack => {
            handler.on_ack(frame.payload());
            true
        }
        MessageType::Unknown(code) => {
            warn!("LINK: ignoring frame with unknown type {code}");
            debug!("LINK: unknown frame payload {} bytes", frame.payload().len());
            false
        }
    }
}
