//! Fuzz target: `WifiCredential::parse_command`
//!
//! cargo fuzz run fuzz_credential_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use pettracker::credentials::{PASSWORD_CAPACITY, SSID_CAPACITY, WifiCredential};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(cred) = WifiCredential::parse_command(text) {
        assert!(!cred.ssid.is_empty() && cred.ssid.len() <= SSID_CAPACITY);
        assert!(cred.password.len() <= PASSWORD_CAPACITY);
        assert!(!cred.ssid.contains(','));
        assert!(cred.join_argument().len() == cred.ssid.len() + cred.password.len() + 1);
    }
});
