//! Unified error types for the tracker core.
//!
//! Every subsystem has its own small `Copy` error enum; all of them convert
//! into [`Error`] so the foreground loop and the binary edge can handle
//! failures uniformly without allocation.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inter-MCU frame could not be built or parsed.
    Frame(FrameError),
    /// An AT command sequence failed.
    At(AtError),
    /// A credential could not be parsed, stored or persisted.
    Credential(CredentialError),
    /// The persistence collaborator failed.
    Storage(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::At(e) => write!(f, "modem: {e}"),
            Self::Credential(e) => write!(f, "credential: {e}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("stored block corrupted"),
            ConfigError::StorageFull => Self::Storage("config block too large"),
            ConfigError::IoError => Self::Storage("config I/O failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload exceeds the fixed frame capacity.
    PayloadTooLarge { len: usize },
    /// Fewer bytes than a whole frame were supplied.
    Truncated { len: usize },
    /// Start or end sentinel does not match.
    BadMarker,
    /// Declared payload length exceeds the payload capacity.
    BadLength(u16),
    /// A text payload was not valid UTF-8.
    NotText,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len } => write!(f, "payload too large ({len} bytes)"),
            Self::Truncated { len } => write!(f, "truncated frame ({len} bytes)"),
            Self::BadMarker => write!(f, "bad start/end marker"),
            Self::BadLength(len) => write!(f, "declared length {len} exceeds capacity"),
            Self::NotText => write!(f, "payload is not text"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// AT engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// No accepted response before the deadline, after every retry.
    NoResponse,
    /// The modem explicitly rejected the command on the final attempt.
    NegativeAck,
    /// A mandatory step of a configuration sequence failed.
    StepFailed(usize),
    /// Placeholders and bound arguments disagree.
    BadArguments,
    /// The rendered command does not fit the line buffer.
    LineTooLong,
    /// The modem UART refused the bytes.
    Transport,
    /// The command table has no room for another step.
    TableFull,
}

impl fmt::Display for AtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response"),
            Self::NegativeAck => write!(f, "negative acknowledgement"),
            Self::StepFailed(idx) => write!(f, "configuration step {idx} failed"),
            Self::BadArguments => write!(f, "invalid arguments"),
            Self::LineTooLong => write!(f, "command line too long"),
            Self::Transport => write!(f, "transport write failed"),
            Self::TableFull => write!(f, "command table full"),
        }
    }
}

impl From<AtError> for Error {
    fn from(e: AtError) -> Self {
        Self::At(e)
    }
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Message is not of the form `ssid:<ssid>,pwd:<password>`.
    Malformed,
    EmptySsid,
    SsidTooLong,
    PasswordTooLong,
    /// Non-printable bytes, a comma in the SSID, or a comma-space anywhere.
    InvalidCharacters,
    /// All slots hold other SSIDs.
    StoreFull,
    /// The persisted block could not be encoded or decoded.
    Encoding,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed credential message"),
            Self::EmptySsid => write!(f, "empty SSID"),
            Self::SsidTooLong => write!(f, "SSID too long"),
            Self::PasswordTooLong => write!(f, "password too long"),
            Self::InvalidCharacters => write!(f, "invalid characters"),
            Self::StoreFull => write!(f, "credential store full"),
            Self::Encoding => write!(f, "credential block encoding failed"),
        }
    }
}

impl From<CredentialError> for Error {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
