//! End-to-end tests for TrackerService → FSM → modem / peer.
//!
//! Every test drives the real service against the simulated modem and
//! companion from the library, with [`MockBoard`](crate::mock_hw::MockBoard)
//! supplying time and sensor values.

use embassy_time::Duration;

use pettracker::adapters::sim_modem::SimModemMode;
use pettracker::app::commands::PeerReply;
use pettracker::app::events::TrackerEvent;
use pettracker::config::{BearerMode, TrackerConfig};
use pettracker::credentials::{CREDENTIALS_INDEX, WifiCredential};
use pettracker::error::{AtError, Error, FrameError};
use pettracker::fsm::StateId;
use pettracker::fsm::context::Bearer;
use pettracker::link::frame::{END_MARKER, MessageType, PAYLOAD_CAPACITY, START_MARKER};

use crate::mock_hw::{HOME_PASSWORD, HOME_SSID, Rig};

const TICK: Duration = Duration::from_millis(100);

fn ble_only() -> TrackerConfig {
    TrackerConfig {
        bearer_mode: BearerMode::BleOnly,
        ..TrackerConfig::default()
    }
}

fn wifi_only() -> TrackerConfig {
    TrackerConfig {
        bearer_mode: BearerMode::WifiOnly,
        default_credentials: Some(WifiCredential::new(HOME_SSID, HOME_PASSWORD).unwrap()),
        ..TrackerConfig::default()
    }
}

fn ble_session() -> Rig {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_app_connected(true);
    assert!(rig.run_until(StateId::BleActive, 10));
    rig
}

fn wifi_session() -> Rig {
    let mut rig = Rig::new(wifi_only());
    assert!(rig.run_until(StateId::WifiActive, 20));
    rig
}

// ── Boot and handshake ────────────────────────────────────────

#[test]
fn ble_handshake_reaches_ble_active() {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_app_connected(true);
    assert_eq!(rig.state(), StateId::Idle);

    assert!(rig.run_until(StateId::BleActive, 10));
    assert_eq!(
        rig.sink.visited(),
        [
            StateId::Configuring,
            StateId::AwaitPeerConnection,
            StateId::BleActive
        ]
    );
    assert_eq!(rig.service.modem_transmissions(), 0, "BLE-only never touches the modem");
    assert_eq!(rig.service.peer().texts(MessageType::Command), ["CONNECT"]);
    assert!(rig.service.telemetry_timer_running());
    assert_eq!(rig.service.context().active_bearer, Some(Bearer::Ble));
}

#[test]
fn peer_nack_returns_to_idle() {
    let mut rig = Rig::new(ble_only());
    for _ in 0..3 {
        rig.step(TICK);
    }
    assert_eq!(
        rig.sink.visited(),
        [
            StateId::Configuring,
            StateId::AwaitPeerConnection,
            StateId::Idle
        ]
    );
}

#[test]
fn inbound_text_connect_is_acked_when_app_connected() {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_auto_reply(false);
    rig.peer().set_app_connected(true);
    rig.step(TICK);
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::AwaitPeerConnection);

    rig.peer().inject_text("CONNECT");
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::BleActive);
    assert_eq!(rig.service.peer().texts(MessageType::Response), ["ACK"]);
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::PeerReplySent(PeerReply::Ack)),
        1
    );
}

#[test]
fn inbound_connect_without_app_is_nacked() {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_auto_reply(false);
    rig.step(TICK);
    rig.step(TICK);

    rig.peer().inject_text("CONNECT");
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(rig.service.peer().texts(MessageType::Response), ["NACK"]);
}

#[test]
fn connect_window_expiry_and_idle_holdoff() {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_auto_reply(false);
    rig.step(TICK);
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::AwaitPeerConnection);

    rig.step(Duration::from_secs(29));
    assert_eq!(rig.state(), StateId::AwaitPeerConnection);
    rig.step(Duration::from_secs(2));
    assert_eq!(rig.state(), StateId::Idle);

    rig.step(Duration::from_secs(10));
    assert_eq!(rig.state(), StateId::Idle, "hold-off not over yet");
    rig.step(Duration::from_secs(6));
    assert_eq!(rig.state(), StateId::Configuring);
}

#[test]
fn idle_answers_connect_with_nack() {
    let mut rig = Rig::new(ble_only());
    rig.peer().set_auto_reply(false);
    rig.step(TICK);
    rig.step(TICK);
    rig.step(Duration::from_secs(31));
    assert_eq!(rig.state(), StateId::Idle);

    rig.peer().set_app_connected(true);
    rig.peer().inject_text("CONNECT");
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(rig.service.peer().texts(MessageType::Response), ["NACK"]);
}

// ── BLE session ───────────────────────────────────────────────

#[test]
fn ble_telemetry_goes_out_with_a_fresh_fix() {
    let mut rig = ble_session();
    rig.board.next_fix = Some((52.1, 4.3));
    rig.step(TICK);

    let responses = rig.service.peer().texts(MessageType::Response);
    assert_eq!(responses, ["52.100000/4.300000/VC:3.87/TC:22.50/PetMov:0"]);
    assert!(!rig.service.context().location.is_fresh);
    assert!(!rig.service.context().telemetry_due);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, TrackerEvent::TelemetrySent { bearer: Bearer::Ble, .. })),
        1
    );
}

#[test]
fn stale_snapshot_does_not_publish() {
    let mut rig = ble_session();
    for _ in 0..5 {
        rig.step(TICK);
    }
    assert!(rig.service.peer().texts(MessageType::Response).is_empty());
    assert!(rig.service.context().telemetry_due, "flag stays pending");
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, TrackerEvent::TelemetrySent { .. })),
        0
    );

    // The pending expiry is served as soon as a fix arrives.
    rig.board.next_fix = Some((1.0, 2.0));
    rig.step(TICK);
    assert_eq!(rig.service.peer().texts(MessageType::Response).len(), 1);
}

#[test]
fn telemetry_follows_the_configured_period() {
    let mut rig = ble_session();
    rig.board.next_fix = Some((1.0, 2.0));
    rig.step(TICK);
    assert_eq!(rig.service.peer().texts(MessageType::Response).len(), 1);

    rig.board.next_fix = Some((1.1, 2.1));
    rig.step(Duration::from_secs(10));
    assert_eq!(
        rig.service.peer().texts(MessageType::Response).len(),
        1,
        "no expiry before the period"
    );
    rig.step(Duration::from_secs(21));
    assert_eq!(rig.service.peer().texts(MessageType::Response).len(), 2);
}

#[test]
fn location_query_before_and_after_fix() {
    let mut rig = ble_session();
    rig.peer().inject_text("LOCATION");
    rig.step(TICK);
    assert_eq!(rig.service.peer().texts(MessageType::Response), ["NACK"]);

    rig.board.moving = true;
    rig.board.next_fix = Some((10.0, 20.0));
    rig.peer().inject_text("LOCATION");
    rig.step(TICK);
    let responses = rig.service.peer().texts(MessageType::Response);
    assert!(
        responses
            .iter()
            .any(|r| r == "10.000000/20.000000/VC:3.87/TC:22.50/PetMov:1")
    );
}

#[test]
fn peer_disconnect_ends_ble_session() {
    let mut rig = ble_session();
    rig.peer().inject_text("DISCONNECT");
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Disconnected);
    assert!(!rig.service.telemetry_timer_running());

    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(
        rig.service.peer().texts(MessageType::Command),
        ["CONNECT", "DISCONNECT"]
    );
}

#[test]
fn losing_the_app_ends_ble_session() {
    let mut rig = ble_session();
    rig.peer().set_app_connected(false);
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Disconnected);
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(rig.service.context().active_bearer, None);
}

#[test]
fn malformed_frame_is_dropped_without_transition() {
    let mut rig = ble_session();
    let mut raw = vec![START_MARKER, 0x01];
    raw.extend_from_slice(&[0u8; PAYLOAD_CAPACITY]);
    raw.extend_from_slice(&255u16.to_le_bytes());
    raw.push(END_MARKER);
    rig.peer().inject_raw(&raw);
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::BleActive);
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::ProtocolError(FrameError::BadLength(255))),
        1
    );
}

// ── Wi-Fi session ─────────────────────────────────────────────

#[test]
fn wifi_only_configures_joins_and_goes_active() {
    let mut rig = wifi_session();
    assert_eq!(
        rig.sink.visited(),
        [
            StateId::Configuring,
            StateId::AwaitPeerConnection,
            StateId::WifiActive
        ]
    );
    let sent = rig.modem().sent().to_vec();
    assert_eq!(sent[0], "AT");
    assert_eq!(sent[1], "AT+WFMODE=0");
    assert_eq!(sent[2], "AT+WFJAPA=home,hunter22");
    assert!(sent.iter().any(|l| l == "AT+WFSTA"));
    assert!(rig.service.peer().received().is_empty(), "Wi-Fi only never talks to the peer");

    // The working default credential is remembered.
    assert_eq!(rig.service.credentials().last_known_good(), Some(0));
    assert!(rig.nvs.blocks.contains_key(&CREDENTIALS_INDEX));
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::CredentialsStored { slot: 0 }),
        1
    );
}

#[test]
fn wifi_telemetry_is_published_through_the_modem() {
    let mut rig = wifi_session();
    rig.board.next_fix = Some((52.1, 4.3));
    rig.step(TICK);

    assert_eq!(rig.modem().published(), ["52.100000/4.300000/VC:3.87/TC:22.50"]);
    assert!(
        rig.modem()
            .sent()
            .iter()
            .any(|l| l == "AT+AWS=CMD MCU_DATA 1 latlong 52.100000/4.300000/VC:3.87/TC:22.50")
    );
    assert!(!rig.service.context().location.is_fresh);
}

#[test]
fn failed_publish_keeps_the_fix_fresh() {
    let mut rig = wifi_session();
    rig.modem().set_mode(SimModemMode::Rejecting);
    rig.board.next_fix = Some((52.1, 4.3));
    rig.step(TICK);

    assert!(rig.modem().published().is_empty());
    assert!(rig.service.context().location.is_fresh);
    assert!(rig.service.context().telemetry_due, "the report is still owed");
    assert!(
        rig.sink
            .count(|e| *e == TrackerEvent::ModemFailure(AtError::NegativeAck))
            >= 1
    );
}

#[test]
fn failed_publish_is_retried_before_the_next_period() {
    let mut rig = wifi_session();
    rig.modem().set_mode(SimModemMode::Rejecting);
    rig.board.next_fix = Some((52.1, 4.3));
    rig.step(TICK);
    assert!(rig.modem().published().is_empty());
    rig.modem().set_mode(SimModemMode::Normal);

    // Within the back-off nothing is sent.
    let before = rig.service.modem_transmissions();
    rig.step(TICK);
    assert_eq!(rig.service.modem_transmissions(), before);

    rig.step(Duration::from_secs(3));
    assert_eq!(rig.modem().published(), ["52.100000/4.300000/VC:3.87/TC:22.50"]);
    assert!(!rig.service.context().telemetry_due);
    assert!(!rig.service.context().location.is_fresh);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, TrackerEvent::TelemetrySent { bearer: Bearer::Wifi, .. })),
        1
    );
}

#[test]
fn disassociation_leads_through_disconnected_to_idle() {
    let mut rig = wifi_session();
    rig.modem().drop_association();
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Disconnected);
    assert_eq!(rig.modem().sent().last().map(String::as_str), Some("AT+WFQAP"));

    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Idle);
    assert!(!rig.service.telemetry_timer_running());
}

#[test]
fn wifi_probe_failure_leads_through_disconnected_to_idle() {
    let mut rig = wifi_session();
    rig.modem().set_mode(SimModemMode::Rejecting);

    rig.step(Duration::from_secs(11));
    assert_eq!(rig.state(), StateId::WifiActive, "probe result lands next tick");
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Disconnected);
    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Idle);

    let tail: Vec<_> = rig.sink.visited().into_iter().rev().take(2).collect();
    assert_eq!(tail, [StateId::Idle, StateId::Disconnected]);
}

#[test]
fn silent_modem_exhausts_configure_attempts() {
    let mut rig = Rig::new(wifi_only());
    rig.modem().set_mode(SimModemMode::Silent);
    for _ in 0..4 {
        rig.step(TICK);
    }

    assert_eq!(rig.state(), StateId::Idle);
    // Three configure attempts, each probing `at_max_retries + 1` times.
    assert_eq!(rig.service.modem_transmissions(), 9);
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::ModemFailure(AtError::StepFailed(0))),
        3
    );
    // Each attempt waited out every probe timeout.
    assert!(rig.board.slept.as_millis() >= 9 * 1000);
}

#[test]
fn wrong_default_password_is_not_stored() {
    let mut cfg = wifi_only();
    cfg.default_credentials = Some(WifiCredential::new(HOME_SSID, "wrong-pass").unwrap());
    let mut rig = Rig::new(cfg);
    for _ in 0..4 {
        rig.step(TICK);
    }

    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(rig.service.credentials().populated(), 0);
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::ModemFailure(AtError::StepFailed(2))),
        3
    );
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn config_updates_apply_and_persist() {
    let mut rig = Rig::new(ble_only());
    let cfg = TrackerConfig {
        telemetry_interval_secs: 60,
        ..ble_only()
    };
    rig.service.update_config(cfg.clone()).unwrap();
    assert_eq!(rig.service.config().telemetry_interval_secs, 60);

    rig.service.save_config(&rig.nvs).unwrap();
    assert_eq!(rig.nvs.saved_config(), Some(cfg));
}

#[test]
fn invalid_config_update_is_rejected() {
    let mut rig = Rig::new(ble_only());
    let bad = TrackerConfig {
        telemetry_interval_secs: 0,
        ..ble_only()
    };

    assert!(matches!(
        rig.service.update_config(bad),
        Err(Error::Config(_))
    ));
    assert_eq!(rig.service.config(), &ble_only(), "live config untouched");

    let zero_retry_step = TrackerConfig {
        at_poll_step_ms: 0,
        ..ble_only()
    };
    assert!(rig.service.update_config(zero_retry_step).is_err());
}
