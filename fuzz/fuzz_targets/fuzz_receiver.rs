//! Fuzz target: `FrameReceiver::feed`
//!
//! Streams arbitrary bytes through both framings in small bursts, draining
//! the queue between bursts. The receiver must never panic and every frame
//! it queues must be non-empty.
//!
//! cargo fuzz run fuzz_receiver

#![no_main]

use libfuzzer_sys::fuzz_target;
use pettracker::link::channels::FrameQueue;
use pettracker::link::frame;
use pettracker::link::receiver::{FrameReceiver, Framing};

fuzz_target!(|data: &[u8]| {
    for framing in [Framing::bridge(), Framing::modem_lines()] {
        let queue = FrameQueue::new();
        let mut rx = FrameReceiver::new(framing, &queue);
        for burst in data.chunks(17) {
            rx.feed(burst);
            while let Some(body) = queue.try_pop() {
                assert!(!body.is_empty());
                let _ = frame::decode_received(&body);
            }
        }
        rx.reset();
        assert!(rx.pending().is_empty());
    }
});
