//! Credential side-channel: phone → companion → tracker → modem → storage.

use embassy_time::Duration;

use pettracker::app::events::TrackerEvent;
use pettracker::config::{BearerMode, TrackerConfig};
use pettracker::credentials::{CredentialStore, WifiCredential};
use pettracker::error::AtError;
use pettracker::fsm::StateId;

use crate::mock_hw::{HOME_PASSWORD, HOME_SSID, MockNvs, Rig};

const TICK: Duration = Duration::from_millis(100);

fn config(mode: BearerMode) -> TrackerConfig {
    TrackerConfig {
        bearer_mode: mode,
        ..TrackerConfig::default()
    }
}

fn ble_session(mode: BearerMode, nvs: MockNvs) -> Rig {
    let mut rig = Rig::with_storage(config(mode), nvs);
    rig.peer().set_app_connected(true);
    assert!(rig.run_until(StateId::BleActive, 10));
    rig
}

fn nvs_with(creds: &[(&str, &str, bool)]) -> MockNvs {
    let mut nvs = MockNvs::new();
    let mut store = CredentialStore::new();
    for &(ssid, pwd, ok) in creds {
        store
            .store(&WifiCredential::new(ssid, pwd).unwrap(), ok)
            .unwrap();
    }
    store.persist(&mut nvs).unwrap();
    nvs
}

fn join_lines(rig: &mut Rig) -> Vec<String> {
    rig.modem()
        .sent()
        .iter()
        .filter(|l| l.starts_with("AT+WFJAPA="))
        .cloned()
        .collect()
}

#[test]
fn credentials_from_the_phone_are_joined_and_persisted() {
    let mut rig = ble_session(BearerMode::Both, MockNvs::new());
    assert_eq!(
        rig.service.modem_transmissions(),
        0,
        "no credentials yet, the modem is left alone"
    );

    rig.peer().inject_text("ssid:home,pwd:hunter22");
    rig.step(TICK);

    assert_eq!(rig.modem().associated(), Some(HOME_SSID));
    assert_eq!(rig.service.credentials().last_known_good(), Some(0));
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::CredentialsStored { slot: 0 }),
        1
    );

    let reloaded = CredentialStore::load(&rig.nvs).unwrap();
    let slot = reloaded.get(0).unwrap();
    assert_eq!(slot.ssid.as_str(), HOME_SSID);
    assert_eq!(slot.password.as_str(), HOME_PASSWORD);
    assert!(slot.last_connect_succeeded);

    rig.step(TICK);
    assert_eq!(rig.state(), StateId::BleActive);
    assert_eq!(rig.service.context().reconfigure_failures, 0);
}

#[test]
fn repeated_reconfigure_failures_force_idle() {
    let mut rig = ble_session(BearerMode::Both, MockNvs::new());
    for _ in 0..3 {
        rig.peer().inject_text("ssid:home,pwd:wrongpass");
        rig.step(TICK);
    }
    assert_eq!(rig.state(), StateId::BleActive);

    rig.step(TICK);
    assert_eq!(rig.state(), StateId::Idle);
    assert_eq!(
        rig.sink
            .count(|e| *e == TrackerEvent::ModemFailure(AtError::NegativeAck)),
        3
    );
    assert_eq!(rig.service.credentials().populated(), 0);
}

#[test]
fn a_successful_change_resets_the_failure_count() {
    let mut rig = ble_session(BearerMode::Both, MockNvs::new());
    for _ in 0..2 {
        rig.peer().inject_text("ssid:home,pwd:wrongpass");
        rig.step(TICK);
    }
    rig.peer().inject_text("ssid:home,pwd:hunter22");
    rig.step(TICK);
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::BleActive);
    assert_eq!(rig.service.context().reconfigure_failures, 0);
    assert_eq!(rig.service.credentials().last_known_good(), Some(0));
}

#[test]
fn known_ssid_failure_is_recorded() {
    let nvs = nvs_with(&[(HOME_SSID, HOME_PASSWORD, true)]);
    let mut rig = Rig::with_storage(config(BearerMode::WifiOnly), nvs);
    assert!(rig.run_until(StateId::WifiActive, 20));

    rig.peer().inject_text("ssid:home,pwd:changed1");
    rig.step(TICK);

    let slot = rig.service.credentials().get(0).unwrap();
    assert!(!slot.last_connect_succeeded);
    assert_eq!(slot.password.as_str(), HOME_PASSWORD, "failed password is not stored");
}

#[test]
fn stored_credentials_are_used_on_the_next_boot() {
    let mut first = Rig::new(TrackerConfig {
        bearer_mode: BearerMode::WifiOnly,
        default_credentials: Some(WifiCredential::new(HOME_SSID, HOME_PASSWORD).unwrap()),
        ..TrackerConfig::default()
    });
    assert!(first.run_until(StateId::WifiActive, 20));
    let nvs = std::mem::take(&mut first.nvs);

    let mut second = Rig::with_storage(config(BearerMode::WifiOnly), nvs);
    assert_eq!(second.service.credentials().populated(), 1);
    assert!(second.run_until(StateId::WifiActive, 20));
    assert_eq!(join_lines(&mut second), ["AT+WFJAPA=home,hunter22"]);
}

#[test]
fn failed_slots_are_retried_round_robin() {
    let nvs = nvs_with(&[("cafe", "latte123", false), (HOME_SSID, HOME_PASSWORD, false)]);
    let mut rig = Rig::with_storage(config(BearerMode::WifiOnly), nvs);
    assert!(rig.run_until(StateId::WifiActive, 20));

    let joins = join_lines(&mut rig);
    assert_eq!(joins.len(), 4, "three attempts at cafe, one at home");
    assert!(joins[..3].iter().all(|l| l == "AT+WFJAPA=cafe,latte123"));
    assert_eq!(joins[3], "AT+WFJAPA=home,hunter22");
    assert_eq!(rig.service.credentials().last_known_good(), Some(1));
    assert!(!rig.service.credentials().get(0).unwrap().last_connect_succeeded);
}

#[test]
fn credentials_are_ignored_while_idle() {
    let mut rig = Rig::new(config(BearerMode::BleOnly));
    rig.peer().inject_text("ssid:home,pwd:hunter22");
    rig.step(TICK);

    assert_eq!(rig.state(), StateId::Configuring);
    assert_eq!(rig.service.credentials().populated(), 0);
    assert!(rig.nvs.blocks.is_empty());
}

#[test]
fn ble_only_stores_untested_credentials() {
    let mut rig = ble_session(BearerMode::BleOnly, MockNvs::new());
    rig.peer().inject_text("ssid:office,pwd:password1");
    rig.step(TICK);

    assert_eq!(rig.service.modem_transmissions(), 0);
    let slot = rig.service.credentials().get(0).unwrap();
    assert_eq!(slot.ssid.as_str(), "office");
    assert!(!slot.last_connect_succeeded);
    assert_eq!(rig.state(), StateId::BleActive);
}

#[test]
fn sixth_network_is_dropped() {
    let nvs = nvs_with(&[
        ("net0", "password", false),
        ("net1", "password", false),
        ("net2", "password", false),
        ("net3", "password", false),
        ("net4", "password", false),
    ]);
    let mut rig = ble_session(BearerMode::BleOnly, nvs);
    rig.peer().inject_text("ssid:net5,pwd:password");
    rig.step(TICK);

    assert_eq!(rig.sink.count(|e| *e == TrackerEvent::CredentialsDropped), 1);
    assert!(rig.service.credentials().find("net5").is_none());
    assert_eq!(rig.service.credentials().populated(), 5);
}

#[test]
fn malformed_credential_message_is_ignored() {
    let mut rig = ble_session(BearerMode::BleOnly, MockNvs::new());
    rig.peer().inject_text("ssid:,pwd:password");
    rig.peer().inject_text("ssid:a, b,pwd:password");
    rig.step(TICK);

    assert_eq!(rig.service.credentials().populated(), 0);
    assert_eq!(rig.state(), StateId::BleActive);
}
