//! PetTracker host simulator.
//!
//! Runs the real [`TrackerService`] loop against simulated peripherals.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimBoard          LogEventSink   NvsAdapter                   │
//! │  (Clock+Sensor)    (EventSink)    (Config+Storage)             │
//! │  SimModem          SimPeer                                     │
//! │  (modem UART)      (bridge UART + BLE state)                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            TrackerService (session logic)              │    │
//! │  │  FSM · AtEngine · CredentialStore · telemetry timer    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scenario: a phone is connected to the companion from boot, so the
//! first session runs over BLE. Midway the phone hands over Wi-Fi
//! credentials, the modem joins, and later the phone goes away and the
//! next session comes up over Wi-Fi.
//!
//! `PETTRACKER_SIM_SECS` bounds the run (default 120); `RUST_LOG`
//! overrides the `info` log level.
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::info;
use tracing_subscriber::EnvFilter;

use pettracker::adapters::hardware::SimBoard;
use pettracker::adapters::log_sink::LogEventSink;
use pettracker::adapters::nvs::NvsAdapter;
use pettracker::adapters::sim_modem::SimModem;
use pettracker::adapters::sim_peer::SimPeer;
use pettracker::app::ports::ConfigPort;
use pettracker::app::service::{Channels, TrackerService};
use pettracker::config::BearerMode;
use pettracker::link::channels::FrameQueue;
use pettracker::timer::TickFlag;

// ── Interrupt-side shared state ───────────────────────────────

static MODEM_RX: FrameQueue = FrameQueue::new();
static PEER_RX: FrameQueue = FrameQueue::new();
static TELEMETRY_TICK: TickFlag = TickFlag::new();

const HOME_SSID: &str = "home-net";
const HOME_PASSWORD: &str = "kibble42";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn sim_duration() -> Result<Duration> {
    match std::env::var("PETTRACKER_SIM_SECS") {
        Ok(v) => {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("PETTRACKER_SIM_SECS='{v}' is not a number"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(120)),
    }
}

fn main() -> Result<()> {
    init_logging();

    info!("╔══════════════════════════════════════╗");
    info!("║  PetTracker sim v{}               ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let run_for = sim_duration()?;

    // ── 1. Persistence and config ─────────────────────────────
    let mut nvs = NvsAdapter::new();
    let mut config = nvs.load().map_err(|e| anyhow!("config load: {e}"))?;
    config.bearer_mode = BearerMode::Both;
    config.telemetry_interval_secs = 10;
    config.loop_interval_ms = 50;
    nvs.save(&config).map_err(|e| anyhow!("config save: {e}"))?;
    let loop_interval = Duration::from_millis(u64::from(config.loop_interval_ms));

    // ── 2. Peripherals ────────────────────────────────────────
    let modem = SimModem::new(&MODEM_RX).with_network(HOME_SSID, HOME_PASSWORD);
    let mut peer = SimPeer::new(&PEER_RX);
    peer.set_app_connected(true);
    let mut board = SimBoard::new((52.370_216, 4.895_168), 20);
    let mut sink = LogEventSink::new();

    // ── 3. Service ────────────────────────────────────────────
    let mut service = TrackerService::new(
        config,
        Channels {
            modem_tx: modem,
            modem_rx: &MODEM_RX,
            peer,
            peer_rx: &PEER_RX,
            telemetry_flag: &TELEMETRY_TICK,
        },
    )
    .map_err(|e| anyhow!("service init: {e}"))?;
    service.start(&board, &nvs, &mut sink);

    // ── 4. Event loop ─────────────────────────────────────────
    let started = std::time::Instant::now();
    let handover_at = run_for / 3;
    let app_leaves_at = run_for * 2 / 3;
    let mut handed_over = false;
    let mut app_left = false;

    info!("System ready. Entering event loop.");
    while started.elapsed() < run_for {
        service.tick(&mut board, &mut nvs, &mut sink);

        if !handed_over && started.elapsed() >= handover_at {
            handed_over = true;
            info!("SIM: phone sends Wi-Fi credentials");
            let msg = format!("ssid:{HOME_SSID},pwd:{HOME_PASSWORD}");
            service.peer_mut().inject_text(&msg);
        }
        if !app_left && started.elapsed() >= app_leaves_at {
            app_left = true;
            info!("SIM: phone disconnects, companion goes quiet");
            let peer = service.peer_mut();
            peer.set_app_connected(false);
            peer.set_auto_reply(false);
        }

        std::thread::sleep(loop_interval);
    }

    info!(
        "SIM: done in {:?} | state={:?} | modem lines={} | published={} | events={}",
        started.elapsed(),
        service.state(),
        service.modem_transmissions(),
        service.modem().published().len(),
        sink.emitted(),
    );
    service
        .save_config(&nvs)
        .map_err(|e| anyhow!("config save: {e}"))?;
    info!("SIM: {} NVS block(s) persisted", nvs.block_count());
    Ok(())
}
