//! Application service: the single foreground owner.
//!
//! [`TrackerService`] owns the FSM, its context, the AT engine, the command
//! table, the credential store and the telemetry timer. Interrupt context
//! only ever touches the two frame queues and the tick flag it was built
//! with. All board I/O flows through port traits injected at call sites.
//!
//! ```text
//!  peer FrameQueue ──▶ ┌──────────────────────────────┐ ──▶ PeerLink (TX)
//! modem FrameQueue ──▶ │        TrackerService        │ ──▶ modem Transport
//!         TickFlag ──▶ │ FSM · AtEngine · Credentials │ ──▶ EventSink
//!     Clock/Sensor ──▶ └──────────────────────────────┘ ◀─▶ StoragePort
//! ```
//!
//! One `tick`:
//! 1. refresh inputs (time, timer, peer link, location)
//! 2. drain the peer queue and the modem's unsolicited lines into the inbox
//! 3. run the FSM
//! 4. perform the actions it queued; results land in `ctx.outcomes`

use core::str;

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::credentials::{CredentialSlot, CredentialStore, WifiCredential};
use crate::error::{AtError, Error, FrameError};
use crate::fsm::context::{Action, Bearer, FsmContext, LinkEvent, PUBLISH_RETRY_DELAY};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::link::channels::FrameQueue;
use crate::link::frame::{self, Frame, FrameHandler};
use crate::link::transport::{Transport, write_all};
use crate::modem::command::{self, CommandId, CommandTable, build_command_table};
use crate::modem::engine::{AtEngine, RetryPolicy};
use crate::modem::events::classify_unsolicited;
use crate::telemetry::TelemetryReport;
use crate::timer::{PeriodicTimer, TickFlag};

use super::commands::{PeerCommand, PeerReply};
use super::events::TrackerEvent;
use super::ports::{Clock, ConfigError, ConfigPort, EventSink, PeerLink, SensorPort, StoragePort};

// ───────────────────────────────────────────────────────────────
// Wiring
// ───────────────────────────────────────────────────────────────

/// Everything the service needs from the outside at construction time.
pub struct Channels<'q, M, P> {
    /// Modem UART TX.
    pub modem_tx: M,
    /// Lines from the modem's line-mode receiver.
    pub modem_rx: &'q FrameQueue,
    /// Inter-MCU bridge TX plus connection state.
    pub peer: P,
    /// Frames from the bridge's delimited receiver.
    pub peer_rx: &'q FrameQueue,
    /// Raised by the telemetry timer.
    pub telemetry_flag: &'q TickFlag,
}

/// Routes decoded peer frames into the FSM inbox.
struct PeerInbox<'a> {
    ctx: &'a mut FsmContext,
}

impl FrameHandler for PeerInbox<'_> {
    fn on_command(&mut self, text: &str) {
        if let Some(cmd) = PeerCommand::parse(text) {
            self.ctx.post_event(LinkEvent::PeerCommand(cmd));
        }
    }

    fn on_response(&mut self, text: &str) {
        match PeerReply::parse(text) {
            Some(reply) => self.ctx.post_event(LinkEvent::PeerReply(reply)),
            None => debug!("SVC: ignoring peer response '{}'", text),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TrackerService
// ───────────────────────────────────────────────────────────────

pub struct TrackerService<'q, M: Transport, P: PeerLink> {
    fsm: Fsm,
    ctx: FsmContext,
    engine: AtEngine<'q, M>,
    commands: CommandTable,
    peer: P,
    peer_rx: &'q FrameQueue,
    timer: PeriodicTimer<'q>,
    store: CredentialStore,
}

impl<'q, M: Transport, P: PeerLink> TrackerService<'q, M, P> {
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: TrackerConfig, channels: Channels<'q, M, P>) -> Result<Self, Error> {
        let commands = build_command_table(&config)?;
        let engine = AtEngine::new(
            channels.modem_tx,
            channels.modem_rx,
            RetryPolicy::from_config(&config),
        );
        Ok(Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: FsmContext::new(config, Instant::from_ticks(0)),
            engine,
            commands,
            peer: channels.peer,
            peer_rx: channels.peer_rx,
            timer: PeriodicTimer::new(channels.telemetry_flag),
            store: CredentialStore::new(),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted credentials and enter Idle.
    pub fn start(&mut self, clock: &impl Clock, storage: &impl StoragePort, sink: &mut impl EventSink) {
        self.ctx.now = clock.now();
        self.store = CredentialStore::load(storage).unwrap_or_else(|e| {
            warn!("SVC: credential block unreadable ({}), starting empty", e);
            CredentialStore::new()
        });
        self.fsm.start(&mut self.ctx);
        sink.emit(&TrackerEvent::Started(self.fsm.current_state()));
        info!("TrackerService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one foreground iteration.
    ///
    /// `hw` satisfies both [`Clock`] and [`SensorPort`]; the engine sleeps
    /// on it and telemetry reads from it.
    pub fn tick(
        &mut self,
        hw: &mut (impl Clock + SensorPort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let prev_state = self.fsm.current_state();

        // 1. Inputs
        self.ctx.now = hw.now();
        self.timer.poll(self.ctx.now);
        if self.timer.flag().take() {
            self.ctx.telemetry_due = true;
        }
        self.ctx.peer_link_up = self.peer.is_connected();
        if let Some((lat, lon)) = hw.poll_location() {
            self.ctx.location.update(lat, lon);
            self.ctx.fix_acquired = true;
        }

        // 2. Inbound traffic
        self.drain_peer(sink);
        self.drain_modem();

        // 3. FSM
        self.fsm.tick(&mut self.ctx);

        // 4. Side effects
        let actions = core::mem::take(&mut self.ctx.actions);
        for action in actions {
            self.perform(action, hw, storage, sink);
        }

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&TrackerEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }
    }

    // ── Configuration ─────────────────────────────────────────

    /// Validate and install a new configuration, rebuilding the command
    /// table. An invalid configuration leaves the live one untouched.
    pub fn update_config(&mut self, config: TrackerConfig) -> Result<(), Error> {
        if let Err(e) = config.validate() {
            warn!("SVC: configuration rejected: {}", e);
            return Err(e.into());
        }
        self.commands = build_command_table(&config)?;
        self.engine.set_policy(RetryPolicy::from_config(&config));
        self.ctx.config = config;
        info!("SVC: configuration updated");
        Ok(())
    }

    pub fn save_config(&self, port: &impl ConfigPort) -> Result<(), ConfigError> {
        port.save(&self.ctx.config)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.ctx.config
    }

    pub fn context(&self) -> &FsmContext {
        &self.ctx
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn modem(&self) -> &M {
        self.engine.transport()
    }

    pub fn modem_mut(&mut self) -> &mut M {
        self.engine.transport_mut()
    }

    /// Modem command lines written so far, retries included.
    pub fn modem_transmissions(&self) -> u32 {
        self.engine.transmissions()
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    pub fn peer_mut(&mut self) -> &mut P {
        &mut self.peer
    }

    pub fn telemetry_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    // ── Inbound ───────────────────────────────────────────────

    fn drain_peer(&mut self, sink: &mut impl EventSink) {
        while let Some(raw) = self.peer_rx.try_pop() {
            match frame::decode_received(&raw) {
                Ok(frame) => {
                    let mut inbox = PeerInbox { ctx: &mut self.ctx };
                    frame::dispatch(&frame, &mut inbox);
                }
                Err(e) => {
                    warn!("SVC: dropping peer frame: {}", e);
                    sink.emit(&TrackerEvent::ProtocolError(e));
                }
            }
        }
    }

    fn drain_modem(&mut self) {
        while let Some(line) = self.engine.next_unsolicited() {
            let Ok(text) = str::from_utf8(&line) else {
                continue;
            };
            match classify_unsolicited(text) {
                Some(event) => {
                    info!("SVC: modem event {:?}", event);
                    self.ctx.post_event(LinkEvent::Modem(event));
                }
                None => debug!("SVC: modem said '{}'", text),
            }
        }
    }

    // ── Actions ───────────────────────────────────────────────

    fn perform(
        &mut self,
        action: Action,
        hw: &mut (impl Clock + SensorPort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match action {
            Action::ConfigureModem => {
                let ok = self.configure_modem(hw, storage, sink);
                self.ctx.outcomes.configure = Some(ok);
            }
            Action::SendPeerConnect => {
                self.send_to_peer(Frame::command(PeerCommand::CONNECT));
            }
            Action::ReplyToPeer(reply) => {
                if self.send_to_peer(Frame::response(reply.as_str())) {
                    sink.emit(&TrackerEvent::PeerReplySent(reply));
                }
            }
            Action::PollWifiStatus => {
                let up = match self.engine.run(&command::status_query(), hw) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!("SVC: status query: {}", e);
                        false
                    }
                };
                self.ctx.outcomes.wifi_status = Some(up);
            }
            Action::StartTelemetryTimer => {
                let period = Duration::from_secs(u64::from(self.ctx.config.telemetry_interval_secs));
                self.timer.start(self.ctx.now, period);
            }
            Action::StopTelemetryTimer => {
                self.timer.stop();
                self.timer.flag().take();
                self.ctx.telemetry_due = false;
            }
            Action::PublishTelemetry(bearer) => self.publish(bearer, hw, sink),
            Action::SendLocationToPeer => {
                let report = TelemetryReport::gather(self.ctx.location, hw);
                match report.ble_payload() {
                    Some(payload) => {
                        self.send_to_peer(Frame::response(&payload));
                    }
                    None => warn!("SVC: location payload does not fit a frame"),
                }
            }
            Action::Reconfigure(cred) => self.reconfigure(&cred, hw, storage, sink),
            Action::TearDown(Bearer::Wifi) => {
                if let Err(e) = self.engine.run(&command::disconnect(), hw) {
                    warn!("SVC: access point disconnect failed: {}", e);
                    sink.emit(&TrackerEvent::ModemFailure(e));
                }
            }
            Action::TearDown(Bearer::Ble) => {
                self.send_to_peer(Frame::command(PeerCommand::DISCONNECT));
            }
        }
    }

    fn send_to_peer(&mut self, frame: Result<Frame, FrameError>) -> bool {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!("SVC: cannot build peer frame: {}", e);
                return false;
            }
        };
        match write_all(&mut self.peer, &frame.to_wire()) {
            Ok(()) => true,
            Err(e) => {
                warn!("SVC: peer write failed: {:?}", e);
                false
            }
        }
    }

    fn publish(
        &mut self,
        bearer: Bearer,
        hw: &mut (impl Clock + SensorPort),
        sink: &mut impl EventSink,
    ) {
        let report = TelemetryReport::gather(self.ctx.location, hw);
        let sent = match bearer {
            Bearer::Wifi => self.publish_wifi(&report, hw, sink),
            Bearer::Ble => report
                .ble_payload()
                .is_some_and(|payload| self.send_to_peer(Frame::response(&payload))),
        };
        if sent {
            self.ctx.telemetry_due = false;
            self.ctx.publish_retry_at = None;
            self.ctx.location.consume();
            sink.emit(&TrackerEvent::TelemetrySent { bearer, report });
        } else {
            // Still due; the fix stays fresh for the retry.
            self.ctx.publish_retry_at = Some(hw.now() + PUBLISH_RETRY_DELAY);
        }
    }

    fn publish_wifi(
        &mut self,
        report: &TelemetryReport,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) -> bool {
        let Some(payload) = report.wifi_payload() else {
            warn!("SVC: telemetry payload overflow");
            return false;
        };
        let cfg = &self.ctx.config;
        let cmd = match command::publish(cfg.shadow_cfg_num, &cfg.shadow_cfg_name, &payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("SVC: cannot build publish command: {}", e);
                return false;
            }
        };
        match self.engine.run(&cmd, clock) {
            Ok(()) => true,
            Err(e) => {
                warn!("SVC: publish failed: {}", e);
                sink.emit(&TrackerEvent::ModemFailure(e));
                false
            }
        }
    }

    // ── Modem configuration and credentials ───────────────────

    /// Pick the credential for the next join: last known good, then the
    /// next failed slot in rotation, then the configured default.
    fn pick_credential(&mut self) -> Option<(Option<usize>, WifiCredential)> {
        let slot = self
            .store
            .last_known_good()
            .or_else(|| self.store.next_retry_candidate());
        if let Some(cred) = slot
            .and_then(|i| self.store.get(i))
            .and_then(CredentialSlot::credential)
        {
            return Some((slot, cred));
        }
        self.ctx.config.default_credentials.clone().map(|c| (None, c))
    }

    fn configure_modem(
        &mut self,
        clock: &mut impl Clock,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.ctx.config.bearer_mode.uses_wifi() {
            info!("SVC: BLE-only mode, modem left unconfigured");
            return true;
        }
        let Some((slot, cred)) = self.pick_credential() else {
            if self.ctx.config.bearer_mode.uses_ble() {
                info!("SVC: no Wi-Fi credentials yet, continuing over BLE");
                return true;
            }
            warn!("SVC: no Wi-Fi credentials available");
            sink.emit(&TrackerEvent::ModemFailure(AtError::BadArguments));
            return false;
        };
        if let Err(e) = self
            .commands
            .bind(CommandId::JoinAp, &[cred.join_argument().as_str()])
        {
            sink.emit(&TrackerEvent::ModemFailure(e));
            return false;
        }
        info!("SVC: configuring modem for '{}'", cred.ssid);

        let result = self.engine.configure_all(&self.commands, clock);

        let join_at = self.commands.position(CommandId::JoinAp);
        let joined = match (result, join_at) {
            (Ok(()), _) => Some(true),
            (Err(AtError::StepFailed(i)), Some(j)) if i > j => Some(true),
            (Err(AtError::StepFailed(i)), Some(j)) if i == j => Some(false),
            _ => None,
        };
        if let Some(joined) = joined {
            self.record_join(slot, &cred, joined, storage, sink);
        }

        match result {
            Ok(()) => true,
            Err(e) => {
                sink.emit(&TrackerEvent::ModemFailure(e));
                false
            }
        }
    }

    fn record_join(
        &mut self,
        slot: Option<usize>,
        cred: &WifiCredential,
        joined: bool,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match slot {
            Some(index) => self.store.record_connect_result(index, joined),
            // A configured default that works is remembered like any other.
            None if joined => self.store_credential(cred, true, sink),
            None => return,
        }
        self.persist_credentials(storage);
    }

    fn reconfigure(
        &mut self,
        cred: &WifiCredential,
        clock: &mut impl Clock,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if !self.ctx.config.bearer_mode.uses_wifi() {
            info!("SVC: BLE-only mode, storing '{}' untested", cred.ssid);
            self.store_credential(cred, false, sink);
            self.persist_credentials(storage);
            return;
        }

        let result = self
            .commands
            .bind(CommandId::JoinAp, &[cred.join_argument().as_str()])
            .and_then(|()| match self.commands.get(CommandId::JoinAp) {
                Some(join) => self.engine.run(join, clock),
                None => Err(AtError::BadArguments),
            });

        match result {
            Ok(()) => {
                info!("SVC: joined '{}'", cred.ssid);
                self.store_credential(cred, true, sink);
                self.ctx.outcomes.reconfigure = Some(true);
            }
            Err(e) => {
                warn!("SVC: join with '{}' failed: {}", cred.ssid, e);
                if let Some(index) = self.store.find(&cred.ssid) {
                    self.store.record_connect_result(index, false);
                }
                sink.emit(&TrackerEvent::ModemFailure(e));
                self.ctx.outcomes.reconfigure = Some(false);
            }
        }
        self.persist_credentials(storage);
    }

    fn store_credential(&mut self, cred: &WifiCredential, succeeded: bool, sink: &mut impl EventSink) {
        match self.store.store(cred, succeeded) {
            Ok(slot) => sink.emit(&TrackerEvent::CredentialsStored { slot }),
            Err(_) => sink.emit(&TrackerEvent::CredentialsDropped),
        }
    }

    fn persist_credentials(&mut self, storage: &mut impl StoragePort) {
        if let Err(e) = self.store.persist(storage) {
            warn!("SVC: credential persist failed: {}", e);
        }
    }
}
