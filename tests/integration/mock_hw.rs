//! Mock board, storage and sinks for integration tests.
//!
//! Time only moves when something sleeps on [`MockBoard`] or a test
//! advances it, so every timeout in the core resolves instantly and
//! deterministically.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;

use pettracker::adapters::sim_modem::SimModem;
use pettracker::adapters::sim_peer::SimPeer;
use pettracker::app::events::TrackerEvent;
use pettracker::app::ports::{
    Clock, ConfigError, ConfigPort, EventSink, SensorPort, StorageError, StoragePort,
};
use pettracker::app::service::{Channels, TrackerService};
use pettracker::config::TrackerConfig;
use pettracker::fsm::StateId;
use pettracker::link::channels::FrameQueue;
use pettracker::link::receiver::{FrameReceiver, Framing};
use pettracker::link::transport::Transport;
use pettracker::timer::TickFlag;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    now: Cell<Instant>,
    pub battery: f32,
    pub temperature: f32,
    pub moving: bool,
    pub next_fix: Option<(f64, f64)>,
    /// Total time spent inside `delay_*`.
    pub slept: Duration,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::from_secs(0)),
            battery: 3.87,
            temperature: 22.5,
            moving: false,
            next_fix: None,
            slept: Duration::from_ticks(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        let d = Duration::from_nanos(u64::from(ns));
        self.slept += d;
        self.advance(d);
    }

    fn delay_ms(&mut self, ms: u32) {
        let d = Duration::from_millis(u64::from(ms));
        self.slept += d;
        self.advance(d);
    }
}

impl Clock for MockBoard {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

impl SensorPort for MockBoard {
    fn battery_voltage(&mut self) -> f32 {
        self.battery
    }

    fn temperature_c(&mut self) -> f32 {
        self.temperature
    }

    fn motion_detected(&mut self) -> bool {
        self.moving
    }

    fn poll_location(&mut self) -> Option<(f64, f64)> {
        self.next_fix.take()
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub blocks: HashMap<u16, Vec<u8>>,
    pub fail_writes: bool,
    pub writes: u32,
    config: RefCell<Option<TrackerConfig>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_config(&self) -> Option<TrackerConfig> {
        self.config.borrow().clone()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, index: u16, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self.blocks.get(&index).ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, index: u16, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes += 1;
        self.blocks.insert(index, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, index: u16) -> Result<(), StorageError> {
        self.blocks.remove(&index);
        Ok(())
    }

    fn exists(&self, index: u16) -> bool {
        self.blocks.contains_key(&index)
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<TrackerConfig, ConfigError> {
        Ok(self.saved_config().unwrap_or_default())
    }

    fn save(&self, config: &TrackerConfig) -> Result<(), ConfigError> {
        *self.config.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<TrackerEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&TrackerEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    /// Every state entered, in order.
    pub fn visited(&self) -> Vec<StateId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TrackerEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &TrackerEvent) {
        self.events.push(event.clone());
    }
}

// ── ScriptedModem ─────────────────────────────────────────────

/// Modem double for engine tests: answers a written line whose command
/// matches a scripted prefix with the scripted reply lines.
pub struct ScriptedModem<'q> {
    rx: FrameReceiver<'q>,
    replies: Vec<(&'static str, Vec<&'static str>)>,
    pending: Vec<u8>,
    pub sent: Vec<String>,
}

#[allow(dead_code)]
impl<'q> ScriptedModem<'q> {
    pub fn new(queue: &'q FrameQueue) -> Self {
        Self {
            rx: FrameReceiver::new(Framing::modem_lines(), queue),
            replies: Vec::new(),
            pending: Vec::new(),
            sent: Vec::new(),
        }
    }

    pub fn on(mut self, prefix: &'static str, lines: &[&'static str]) -> Self {
        self.replies.push((prefix, lines.to_vec()));
        self
    }

    /// Push a line as if the modem sent it on its own.
    pub fn unsolicited(&mut self, line: &str) {
        self.rx.feed(line.as_bytes());
        self.rx.feed(b"\r\n");
    }

    fn answer(&mut self, line: &str) {
        let script = self.replies.iter().find(|(prefix, _)| {
            line.strip_prefix(*prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['=', ' ']))
        });
        let Some((_, lines)) = script else {
            return;
        };
        for reply in lines.clone() {
            self.unsolicited(reply);
        }
    }
}

impl Transport for ScriptedModem<'_> {
    type Error = ();

    fn write(&mut self, data: &[u8]) -> Result<usize, ()> {
        for &b in data {
            if b == b'\r' || b == b'\n' {
                if !self.pending.is_empty() {
                    let line = String::from_utf8(std::mem::take(&mut self.pending)).map_err(|_| ())?;
                    self.answer(&line);
                    self.sent.push(line);
                }
            } else {
                self.pending.push(b);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

// ── Rig: service wired to simulated peripherals ───────────────

pub const HOME_SSID: &str = "home";
pub const HOME_PASSWORD: &str = "hunter22";

pub type Service = TrackerService<'static, SimModem<'static>, SimPeer<'static>>;

pub struct Rig {
    pub service: Service,
    pub board: MockBoard,
    pub nvs: MockNvs,
    pub sink: LogSink,
}

#[allow(dead_code)]
impl Rig {
    /// Service with the home network in range and empty storage.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_storage(config, MockNvs::new())
    }

    pub fn with_storage(config: TrackerConfig, nvs: MockNvs) -> Self {
        let modem_rx: &'static FrameQueue = Box::leak(Box::new(FrameQueue::new()));
        let peer_rx: &'static FrameQueue = Box::leak(Box::new(FrameQueue::new()));
        let flag: &'static TickFlag = Box::leak(Box::new(TickFlag::new()));

        let modem = SimModem::new(modem_rx).with_network(HOME_SSID, HOME_PASSWORD);
        let service = TrackerService::new(
            config,
            Channels {
                modem_tx: modem,
                modem_rx,
                peer: SimPeer::new(peer_rx),
                peer_rx,
                telemetry_flag: flag,
            },
        )
        .expect("default command table builds");

        let mut rig = Self {
            service,
            board: MockBoard::new(),
            nvs,
            sink: LogSink::new(),
        };
        rig.service.start(&rig.board, &rig.nvs, &mut rig.sink);
        rig
    }

    pub fn state(&self) -> StateId {
        self.service.state()
    }

    pub fn peer(&mut self) -> &mut SimPeer<'static> {
        self.service.peer_mut()
    }

    pub fn modem(&mut self) -> &mut SimModem<'static> {
        self.service.modem_mut()
    }

    pub fn tick(&mut self) {
        self.service
            .tick(&mut self.board, &mut self.nvs, &mut self.sink);
    }

    /// Advance time by `by`, then tick once.
    pub fn step(&mut self, by: Duration) {
        self.board.advance(by);
        self.tick();
    }

    /// Tick in 100 ms steps until `state` is reached or `max_ticks` ran out.
    pub fn run_until(&mut self, state: StateId, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            if self.state() == state {
                return true;
            }
            self.step(Duration::from_millis(100));
        }
        self.state() == state
    }
}
