//! Simulated BLE companion MCU.
//!
//! Implements [`PeerLink`]: frames the tracker writes are decoded and kept
//! for inspection, and a `CONNECT` command is answered the way the
//! companion firmware does, with `ACK` while a phone holds the BLE link
//! and `NACK` otherwise. Anything the companion "sends" goes through a
//! bridge-mode [`FrameReceiver`] into the peer queue.

use log::{debug, warn};

use crate::app::commands::{PeerCommand, PeerReply};
use crate::app::ports::PeerLink;
use crate::link::channels::FrameQueue;
use crate::link::frame::{self, FRAME_LEN, Frame, MessageType};
use crate::link::receiver::{FrameReceiver, Framing};
use crate::link::transport::Transport;

pub struct SimPeer<'q> {
    rx: FrameReceiver<'q>,
    app_connected: bool,
    auto_reply: bool,
    pending: Vec<u8>,
    received: Vec<Frame>,
}

impl<'q> SimPeer<'q> {
    pub fn new(inbound: &'q FrameQueue) -> Self {
        Self {
            rx: FrameReceiver::new(Framing::bridge(), inbound),
            app_connected: false,
            auto_reply: true,
            pending: Vec::new(),
            received: Vec::new(),
        }
    }

    /// A phone connects to (or leaves) the companion.
    pub fn set_app_connected(&mut self, connected: bool) {
        self.app_connected = connected;
    }

    /// Whether `CONNECT` commands get an automatic handshake reply.
    pub fn set_auto_reply(&mut self, enabled: bool) {
        self.auto_reply = enabled;
    }

    /// Deliver a binary frame from the companion.
    pub fn inject(&mut self, frame: &Frame) {
        self.rx.feed(&frame.to_wire());
    }

    /// Deliver a short text command such as `*CONNECT#`.
    pub fn inject_text(&mut self, text: &str) {
        self.rx.feed(&[frame::START_MARKER]);
        self.rx.feed(text.as_bytes());
        self.rx.feed(&[frame::END_MARKER]);
    }

    /// Deliver raw bytes, well-formed or not.
    pub fn inject_raw(&mut self, bytes: &[u8]) {
        self.rx.feed(bytes);
    }

    /// Frames the tracker wrote, oldest first.
    pub fn received(&self) -> &[Frame] {
        &self.received
    }

    /// Text payloads of the frames the tracker wrote with `message_type`.
    pub fn texts(&self, message_type: MessageType) -> Vec<String> {
        self.received
            .iter()
            .filter(|f| f.message_type() == message_type)
            .filter_map(|f| f.text().ok().map(String::from))
            .collect()
    }

    fn on_frame(&mut self, frame: Frame) {
        debug!("SIM-PEER: << {:?}", frame.message_type());
        let handshake = frame.message_type() == MessageType::Command
            && frame.text().ok().and_then(PeerCommand::parse) == Some(PeerCommand::Connect);
        self.received.push(frame);
        if handshake && self.auto_reply {
            let reply = if self.app_connected {
                PeerReply::Ack
            } else {
                PeerReply::Nack
            };
            match Frame::response(reply.as_str()) {
                Ok(f) => self.inject(&f),
                Err(e) => warn!("SIM-PEER: cannot build reply: {}", e),
            }
        }
    }
}

impl PeerLink for SimPeer<'_> {
    fn is_connected(&self) -> bool {
        self.app_connected
    }
}

impl Transport for SimPeer<'_> {
    type Error = core::convert::Infallible;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= FRAME_LEN {
            let raw: Vec<u8> = self.pending.drain(..FRAME_LEN).collect();
            match frame::decode(&raw) {
                Ok(f) => self.on_frame(f),
                Err(e) => warn!("SIM-PEER: undecodable frame: {}", e),
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
