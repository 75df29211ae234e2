//! Concrete state handler functions and table builder.
//!
//! Each state is three plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap. Handlers only read the context and queue actions.
//!
//! ```text
//!  IDLE ──[boot / hold-off]──▶ CONFIGURING ──[ok]──▶ AWAIT_PEER_CONNECTION
//!    ▲                             │                     │        │
//!    │◀──[attempts exhausted]──────┘       [ACK / CONNECT]   [+WFJAP:1 / status ok]
//!    │                                                   ▼        ▼
//!    │◀──[NACK / window expired]──────────────── BLE_ACTIVE   WIFI_ACTIVE
//!    │                                                   │        │
//!    │                                   [link lost / DISCONNECT] │
//!    │                                                   ▼        ▼
//!    └───────────────────────────────────────────── DISCONNECTED ◀┘
//! ```

use embassy_time::Duration;
use log::{debug, info, warn};

use super::context::{Action, Bearer, FsmContext, LinkEvent};
use super::{StateDescriptor, StateId};
use crate::app::commands::{PeerCommand, PeerReply};
use crate::modem::events::ModemEvent;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Configuring
        StateDescriptor {
            id: StateId::Configuring,
            name: "Configuring",
            on_enter: Some(configuring_enter),
            on_exit: None,
            on_update: configuring_update,
        },
        // Index 2: AwaitPeerConnection
        StateDescriptor {
            id: StateId::AwaitPeerConnection,
            name: "AwaitPeerConnection",
            on_enter: Some(await_enter),
            on_exit: None,
            on_update: await_update,
        },
        // Index 3: WifiActive
        StateDescriptor {
            id: StateId::WifiActive,
            name: "WifiActive",
            on_enter: Some(wifi_active_enter),
            on_exit: Some(active_exit),
            on_update: wifi_active_update,
        },
        // Index 4: BleActive
        StateDescriptor {
            id: StateId::BleActive,
            name: "BleActive",
            on_enter: Some(ble_active_enter),
            on_exit: Some(active_exit),
            on_update: ble_active_update,
        },
        // Index 5: Disconnected
        StateDescriptor {
            id: StateId::Disconnected,
            name: "Disconnected",
            on_enter: Some(disconnected_enter),
            on_exit: None,
            on_update: disconnected_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

fn secs(s: impl Into<u64>) -> Duration {
    Duration::from_secs(s.into())
}

fn answer_location(ctx: &mut FsmContext) {
    if ctx.fix_acquired {
        ctx.request(Action::SendLocationToPeer);
    } else {
        debug!("FSM: LOCATION requested before first fix");
        ctx.request(Action::ReplyToPeer(PeerReply::Nack));
    }
}

/// Events every non-session state treats the same way.
fn handle_offline_event(ctx: &mut FsmContext, event: LinkEvent, state: &str) {
    match event {
        LinkEvent::PeerCommand(PeerCommand::Connect) => {
            info!("{state}: peer CONNECT refused");
            ctx.request(Action::ReplyToPeer(PeerReply::Nack));
        }
        LinkEvent::PeerCommand(PeerCommand::Location) => answer_location(ctx),
        LinkEvent::PeerCommand(PeerCommand::Credentials(cred)) => {
            info!("{state}: ignoring credentials for '{}'", cred.ssid);
        }
        other => debug!("{state}: ignoring {:?}", other),
    }
}

/// Consume a reconfigure result and update the failure count. Returns
/// whether the join succeeded, or `None` if no result is pending.
fn settle_reconfigure(ctx: &mut FsmContext) -> Option<bool> {
    let succeeded = ctx.outcomes.reconfigure.take()?;
    if succeeded {
        ctx.reconfigure_failures = 0;
    } else {
        ctx.reconfigure_failures = ctx.reconfigure_failures.saturating_add(1);
        warn!(
            "FSM: reconfigure failed ({}/{})",
            ctx.reconfigure_failures, ctx.config.reconfigure_failure_limit
        );
    }
    Some(succeeded)
}

fn reconfigure_limit_hit(ctx: &mut FsmContext) -> bool {
    if ctx.reconfigure_failures >= ctx.config.reconfigure_failure_limit {
        warn!("FSM: too many failed credential changes, dropping to Idle");
        ctx.reconfigure_failures = 0;
        return true;
    }
    false
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.configure_attempts = 0;
    ctx.active_bearer = None;
    ctx.outcomes = Default::default();
    info!("IDLE: holding off {}s", ctx.config.idle_holdoff_secs);
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(event) = ctx.next_event() {
        handle_offline_event(ctx, event, "IDLE");
    }

    if ctx.boot_pending {
        ctx.boot_pending = false;
        return Some(StateId::Configuring);
    }
    if ctx.elapsed_in_state() >= secs(ctx.config.idle_holdoff_secs) {
        return Some(StateId::Configuring);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONFIGURING
// ═══════════════════════════════════════════════════════════════════════════

fn configuring_enter(ctx: &mut FsmContext) {
    ctx.configure_attempts = 1;
    ctx.outcomes.configure = None;
    ctx.request(Action::ConfigureModem);
    info!(
        "CONFIGURING: attempt 1/{}",
        ctx.config.configure_attempts
    );
}

fn configuring_update(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(event) = ctx.next_event() {
        handle_offline_event(ctx, event, "CONFIGURING");
    }

    match ctx.outcomes.configure.take()? {
        true => Some(StateId::AwaitPeerConnection),
        false if ctx.configure_attempts >= ctx.config.configure_attempts => {
            warn!(
                "CONFIGURING: giving up after {} attempt(s)",
                ctx.configure_attempts
            );
            Some(StateId::Idle)
        }
        false => {
            ctx.configure_attempts += 1;
            info!(
                "CONFIGURING: attempt {}/{}",
                ctx.configure_attempts, ctx.config.configure_attempts
            );
            ctx.request(Action::ConfigureModem);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAIT_PEER_CONNECTION
// ═══════════════════════════════════════════════════════════════════════════

fn await_enter(ctx: &mut FsmContext) {
    ctx.outcomes.wifi_status = None;
    ctx.last_status_poll = None;
    if ctx.config.bearer_mode.uses_ble() {
        ctx.request(Action::SendPeerConnect);
    }
    info!(
        "AWAIT: waiting up to {}s for peer or access point",
        ctx.config.peer_connect_window_secs
    );
}

fn await_update(ctx: &mut FsmContext) -> Option<StateId> {
    let mode = ctx.config.bearer_mode;

    while let Some(event) = ctx.next_event() {
        match event {
            LinkEvent::PeerReply(PeerReply::Ack) => {
                return Some(if mode.uses_ble() {
                    StateId::BleActive
                } else {
                    StateId::WifiActive
                });
            }
            LinkEvent::PeerReply(PeerReply::Nack) => {
                info!("AWAIT: peer refused the session");
                return Some(StateId::Idle);
            }
            LinkEvent::PeerCommand(PeerCommand::Connect) => {
                if ctx.peer_link_up {
                    ctx.request(Action::ReplyToPeer(PeerReply::Ack));
                    return Some(StateId::BleActive);
                }
                warn!("AWAIT: CONNECT without an app connection");
                ctx.request(Action::ReplyToPeer(PeerReply::Nack));
                return Some(StateId::Idle);
            }
            LinkEvent::PeerCommand(PeerCommand::Credentials(cred)) => {
                ctx.request(Action::Reconfigure(cred));
            }
            LinkEvent::PeerCommand(PeerCommand::Location) => answer_location(ctx),
            LinkEvent::PeerCommand(PeerCommand::Disconnect) => {
                info!("AWAIT: peer cancelled the handshake");
                return Some(StateId::Idle);
            }
            LinkEvent::Modem(ModemEvent::Associated) if mode.uses_wifi() => {
                return Some(StateId::WifiActive);
            }
            other => debug!("AWAIT: ignoring {:?}", other),
        }
    }

    if let Some(joined) = settle_reconfigure(ctx) {
        if joined && mode.uses_wifi() {
            return Some(StateId::WifiActive);
        }
        if reconfigure_limit_hit(ctx) {
            return Some(StateId::Idle);
        }
    }

    if ctx.outcomes.wifi_status.take() == Some(true) {
        return Some(StateId::WifiActive);
    }

    if ctx.elapsed_in_state() >= secs(ctx.config.peer_connect_window_secs) {
        warn!("AWAIT: connect window expired");
        return Some(StateId::Idle);
    }

    let poll = Duration::from_millis(u64::from(ctx.config.status_poll_interval_ms));
    if mode.uses_wifi() && ctx.status_poll_due(poll) {
        ctx.last_status_poll = Some(ctx.now);
        ctx.request(Action::PollWifiStatus);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  WIFI_ACTIVE / BLE_ACTIVE
// ═══════════════════════════════════════════════════════════════════════════

fn enter_session(ctx: &mut FsmContext, bearer: Bearer) {
    ctx.active_bearer = Some(bearer);
    ctx.last_status_poll = Some(ctx.now);
    ctx.outcomes.wifi_status = None;
    ctx.publish_retry_at = None;
    ctx.request(Action::StartTelemetryTimer);
    info!(
        "ACTIVE: {:?} session up, telemetry every {}s",
        bearer, ctx.config.telemetry_interval_secs
    );
}

fn wifi_active_enter(ctx: &mut FsmContext) {
    enter_session(ctx, Bearer::Wifi);
}

fn ble_active_enter(ctx: &mut FsmContext) {
    enter_session(ctx, Bearer::Ble);
}

fn active_exit(ctx: &mut FsmContext) {
    ctx.request(Action::StopTelemetryTimer);
}

/// Event handling shared by both session states. Returns `true` when the
/// session must end.
fn handle_session_event(ctx: &mut FsmContext, event: LinkEvent, bearer: Bearer) -> bool {
    match event {
        LinkEvent::PeerCommand(PeerCommand::Disconnect) => {
            info!("ACTIVE: peer requested disconnect");
            return true;
        }
        LinkEvent::PeerCommand(PeerCommand::Connect) => {
            let reply = if ctx.peer_link_up {
                PeerReply::Ack
            } else {
                PeerReply::Nack
            };
            ctx.request(Action::ReplyToPeer(reply));
        }
        LinkEvent::PeerCommand(PeerCommand::Credentials(cred)) => {
            ctx.request(Action::Reconfigure(cred));
        }
        LinkEvent::PeerCommand(PeerCommand::Location) => answer_location(ctx),
        LinkEvent::Modem(ModemEvent::Disassociated) if bearer == Bearer::Wifi => {
            warn!("ACTIVE: access point dropped us");
            return true;
        }
        other => debug!("ACTIVE: ignoring {:?}", other),
    }
    false
}

fn maybe_publish(ctx: &mut FsmContext, bearer: Bearer) {
    if !ctx.telemetry_due {
        return;
    }
    if ctx.publish_retry_at.is_some_and(|at| ctx.now < at) {
        return;
    }
    if ctx.location.is_fresh {
        ctx.request(Action::PublishTelemetry(bearer));
    } else {
        debug!("ACTIVE: telemetry due but snapshot is stale");
    }
}

fn wifi_active_update(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(event) = ctx.next_event() {
        if handle_session_event(ctx, event, Bearer::Wifi) {
            return Some(StateId::Disconnected);
        }
    }

    if settle_reconfigure(ctx).is_some() && reconfigure_limit_hit(ctx) {
        return Some(StateId::Idle);
    }

    if ctx.outcomes.wifi_status.take() == Some(false) {
        warn!("ACTIVE: Wi-Fi link check failed");
        return Some(StateId::Disconnected);
    }

    maybe_publish(ctx, Bearer::Wifi);

    if ctx.status_poll_due(secs(ctx.config.link_check_interval_secs)) {
        ctx.last_status_poll = Some(ctx.now);
        ctx.request(Action::PollWifiStatus);
    }
    None
}

fn ble_active_update(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(event) = ctx.next_event() {
        if handle_session_event(ctx, event, Bearer::Ble) {
            return Some(StateId::Disconnected);
        }
    }

    if settle_reconfigure(ctx).is_some() && reconfigure_limit_hit(ctx) {
        return Some(StateId::Idle);
    }

    if !ctx.peer_link_up {
        warn!("ACTIVE: companion lost its app connection");
        return Some(StateId::Disconnected);
    }

    maybe_publish(ctx, Bearer::Ble);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_enter(ctx: &mut FsmContext) {
    ctx.telemetry_due = false;
    if let Some(bearer) = ctx.active_bearer.take() {
        info!("DISCONNECTED: tearing down {:?}", bearer);
        ctx.request(Action::TearDown(bearer));
    }
}

fn disconnected_update(ctx: &mut FsmContext) -> Option<StateId> {
    while let Some(event) = ctx.next_event() {
        handle_offline_event(ctx, event, "DISCONNECTED");
    }
    Some(StateId::Idle)
}
