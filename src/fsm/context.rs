//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the "blackboard": the service writes inputs (time, peer
//! link state, inbound events, results of last tick's actions), handlers
//! read them and queue [`Action`]s, and the service performs those actions
//! after the tick. Handlers never touch a port.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};
use log::warn;

use crate::app::commands::{PeerCommand, PeerReply};
use crate::config::TrackerConfig;
use crate::credentials::WifiCredential;
use crate::modem::events::ModemEvent;
use crate::telemetry::LocationSnapshot;

/// Inbound events held between service drains.
pub const INBOX_DEPTH: usize = 8;

/// Actions one tick may queue.
pub const ACTION_CAPACITY: usize = 8;

/// Wait before retrying a telemetry send that failed.
pub const PUBLISH_RETRY_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Transport a session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bearer {
    Wifi,
    Ble,
}

/// Something that arrived from the peer or the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    PeerCommand(PeerCommand),
    PeerReply(PeerReply),
    Modem(ModemEvent),
}

/// Results of actions performed after the previous tick. Each is consumed
/// (taken) by the handler that requested it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcomes {
    pub configure: Option<bool>,
    pub wifi_status: Option<bool>,
    pub reconfigure: Option<bool>,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Side effects requested by handlers, performed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run the modem configuration sequence.
    ConfigureModem,
    /// Send a CMD `CONNECT` frame to the companion.
    SendPeerConnect,
    /// Answer the companion's handshake.
    ReplyToPeer(PeerReply),
    /// Query the modem's association status.
    PollWifiStatus,
    StartTelemetryTimer,
    StopTelemetryTimer,
    /// Send the current snapshot over `Bearer`.
    PublishTelemetry(Bearer),
    /// Answer a `LOCATION` query with the current snapshot.
    SendLocationToPeer,
    /// Join with new credentials and store them.
    Reconfigure(WifiCredential),
    /// Leave the bearer's session.
    TearDown(Bearer),
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    // -- Timing --
    /// Time of the current tick.
    pub now: Instant,
    /// Time the current state was entered.
    pub state_entered: Instant,

    // -- Configuration --
    pub config: TrackerConfig,

    // -- Inputs --
    pub inbox: Deque<LinkEvent, INBOX_DEPTH>,
    /// Companion reports an app connection.
    pub peer_link_up: bool,
    /// Telemetry timer expired and no report went out since.
    pub telemetry_due: bool,
    /// Earliest retry after a failed send.
    pub publish_retry_at: Option<Instant>,
    pub location: LocationSnapshot,
    /// At least one fix has been received since boot.
    pub fix_acquired: bool,
    pub outcomes: Outcomes,

    // -- Bookkeeping --
    /// The first Idle tick configures immediately instead of waiting.
    pub boot_pending: bool,
    pub configure_attempts: u8,
    pub reconfigure_failures: u8,
    /// Last status query (association wait or link check).
    pub last_status_poll: Option<Instant>,
    pub active_bearer: Option<Bearer>,

    // -- Outputs --
    pub actions: Vec<Action, ACTION_CAPACITY>,
}

impl FsmContext {
    pub fn new(config: TrackerConfig, now: Instant) -> Self {
        Self {
            now,
            state_entered: now,
            config,
            inbox: Deque::new(),
            peer_link_up: false,
            telemetry_due: false,
            publish_retry_at: None,
            location: LocationSnapshot::default(),
            fix_acquired: false,
            outcomes: Outcomes::default(),
            boot_pending: true,
            configure_attempts: 0,
            reconfigure_failures: 0,
            last_status_poll: None,
            active_bearer: None,
            actions: Vec::new(),
        }
    }

    /// Time spent in the current state.
    pub fn elapsed_in_state(&self) -> Duration {
        self.now.saturating_duration_since(self.state_entered)
    }

    /// Whether `interval` has passed since the last status query.
    pub fn status_poll_due(&self, interval: Duration) -> bool {
        self.last_status_poll
            .is_none_or(|last| self.now.saturating_duration_since(last) >= interval)
    }

    /// Queue a side effect for the service.
    pub fn request(&mut self, action: Action) {
        if let Err(action) = self.actions.push(action) {
            warn!("FSM: action queue full, dropping {:?}", action);
        }
    }

    pub fn post_event(&mut self, event: LinkEvent) {
        if let Err(event) = self.inbox.push_back(event) {
            warn!("FSM: inbox full, dropping {:?}", event);
        }
    }

    pub fn next_event(&mut self) -> Option<LinkEvent> {
        self.inbox.pop_front()
    }
}
