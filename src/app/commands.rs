//! Inbound peer messages.
//!
//! Text carried by CMD and RESP frames from the companion MCU, parsed
//! into the commands and replies the state machine understands.

use log::warn;

use crate::credentials::WifiCredential;

/// Requests the companion can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
    /// Session handshake.
    Connect,
    /// Tear the active session down.
    Disconnect,
    /// Ask for the latest position.
    Location,
    /// New Wi-Fi credentials (`ssid:<s>,pwd:<p>`).
    Credentials(WifiCredential),
}

impl PeerCommand {
    pub const CONNECT: &'static str = "CONNECT";
    pub const DISCONNECT: &'static str = "DISCONNECT";
    pub const LOCATION: &'static str = "LOCATION";

    /// Returns `None` (logged) for anything unrecognised or malformed.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_end_matches(['\0', '\r', '\n']);
        match text {
            Self::CONNECT => Some(Self::Connect),
            Self::DISCONNECT => Some(Self::Disconnect),
            Self::LOCATION => Some(Self::Location),
            _ if text.starts_with("ssid:") => match WifiCredential::parse_command(text) {
                Ok(cred) => Some(Self::Credentials(cred)),
                Err(e) => {
                    warn!("PEER: rejected credential message: {}", e);
                    None
                }
            },
            _ => {
                warn!("PEER: unknown command '{}'", text);
                None
            }
        }
    }
}

/// Handshake answers, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerReply {
    Ack,
    Nack,
}

impl PeerReply {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim_end_matches(['\0', '\r', '\n']) {
            "ACK" => Some(Self::Ack),
            "NACK" => Some(Self::Nack),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::Nack => "NACK",
        }
    }
}
