//! Fuzz target: `frame::decode` / `frame::decode_received`
//!
//! Feeds arbitrary bytes to both decoders and checks that anything they
//! accept stays within the payload capacity and survives a re-encode.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use pettracker::link::frame::{self, PAYLOAD_CAPACITY};

fuzz_target!(|data: &[u8]| {
    if let Ok(f) = frame::decode(data) {
        assert!(f.payload().len() <= PAYLOAD_CAPACITY);
        let again = frame::decode(&f.to_wire()).expect("re-encoded frame must decode");
        assert_eq!(again, f);
    }

    if let Ok(f) = frame::decode_received(data) {
        assert!(f.payload().len() <= PAYLOAD_CAPACITY);
    }
});
