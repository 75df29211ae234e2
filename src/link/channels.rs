//! Bounded frame queues between UART receive context and the foreground loop.
//!
//! Wraps an `embassy-sync` channel guarded by a critical-section mutex so
//! the producer side can run in interrupt context. Only the non-blocking
//! `try_*` operations are exposed: a full queue drops the newest frame, an
//! empty queue returns `None`.
//!
//! ```text
//! ┌──────────────┐   RxFrame    ┌──────────────┐
//! │ RX interrupt │────────────▶│  Foreground   │
//! │ (producer)   │  try_push    │  try_pop      │
//! └──────────────┘              └──────────────┘
//! ```
//!
//! A queue is owned by whoever wires the channel (normally a `static` in
//! the binary) and lent by reference to one receiver and one consumer.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

/// Capacity of one received frame (bytes between sentinels / terminators).
pub const RX_FRAME_CAPACITY: usize = 255;

/// Queue depth per channel.
pub const QUEUE_DEPTH: usize = 10;

/// One completed frame as delivered by a receiver.
pub type RxFrame = Vec<u8, RX_FRAME_CAPACITY>;

/// FIFO of completed frames for a single UART channel.
pub struct FrameQueue {
    inner: Channel<CriticalSectionRawMutex, RxFrame, QUEUE_DEPTH>,
}

impl FrameQueue {
    pub const fn new() -> Self {
        Self {
            inner: Channel::new(),
        }
    }

    /// Non-blocking enqueue. Returns `false` (frame dropped) when full.
    pub fn try_push(&self, frame: RxFrame) -> bool {
        self.inner.try_send(frame).is_ok()
    }

    /// Non-blocking dequeue in arrival order.
    pub fn try_pop(&self) -> Option<RxFrame> {
        self.inner.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
