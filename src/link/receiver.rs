//! Interrupt-context byte accumulator.
//!
//! One [`FrameReceiver`] per UART channel turns a raw byte stream into
//! discrete frames and pushes each completed frame onto that channel's
//! [`FrameQueue`].
//!
//! ```text
//!   AwaitStart ──[start byte / non-terminator]──▶ Receiving
//!       ▲                                           │
//!       │         [overflow / framing error]        │
//!       ├───────────────────────────────────────────┤
//!       │                                           │ [end byte / terminator]
//!       └──────────── (next byte) ◀── FrameDone ◀───┘
//! ```
//!
//! `on_byte` never blocks and never allocates: the accumulation buffer is
//! fixed-capacity and the queue push is non-blocking. Its boolean return
//! is only meant for logging.

use super::channels::{FrameQueue, RX_FRAME_CAPACITY, RxFrame};
use super::frame::{BODY_LEN, END_MARKER, START_MARKER};

/// How frame boundaries are recognised on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Text lines: any non-terminator byte opens a frame, `\r`/`\n` closes it.
    Line,
    /// Sentinel-delimited frames. With `fixed_body = Some(n)`, a body that
    /// begins with a control byte is binary and is collected as exactly `n`
    /// bytes before the end sentinel is expected, so the payload may itself
    /// contain the end byte.
    Delimited {
        start: u8,
        end: u8,
        fixed_body: Option<usize>,
    },
}

impl Framing {
    /// AT modem responses.
    pub const fn modem_lines() -> Self {
        Self::Line
    }

    /// Inter-MCU bridge: `*...#` text commands and binary frames.
    pub const fn bridge() -> Self {
        Self::Delimited {
            start: START_MARKER,
            end: END_MARKER,
            fixed_body: Some(BODY_LEN),
        }
    }
}

/// Receive session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    AwaitStart,
    Receiving,
    /// A frame was just completed; the next byte is handled as `AwaitStart`.
    FrameDone,
}

/// Per-channel counters, read by the foreground loop for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    pub completed: u32,
    pub dropped_queue_full: u32,
    pub overflows: u32,
    pub framing_errors: u32,
}

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

fn is_binary_type(byte: u8) -> bool {
    byte < 0x20
}

/// Byte-level framing state machine for one UART channel.
pub struct FrameReceiver<'q> {
    framing: Framing,
    state: RxState,
    buf: RxFrame,
    /// Expected body length once a binary body has been detected.
    binary_len: Option<usize>,
    queue: &'q FrameQueue,
    stats: RxStats,
}

impl<'q> FrameReceiver<'q> {
    pub fn new(framing: Framing, queue: &'q FrameQueue) -> Self {
        Self {
            framing,
            state: RxState::AwaitStart,
            buf: RxFrame::new(),
            binary_len: None,
            queue,
            stats: RxStats::default(),
        }
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn stats(&self) -> RxStats {
        self.stats
    }

    /// Bytes accumulated for the frame in progress.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Feed one byte. Returns `true` when it completed a frame that was
    /// accepted by the queue.
    pub fn on_byte(&mut self, byte: u8) -> bool {
        if self.state == RxState::FrameDone {
            self.state = RxState::AwaitStart;
        }
        match self.framing {
            Framing::Line => self.on_line_byte(byte),
            Framing::Delimited {
                start,
                end,
                fixed_body,
            } => self.on_delimited_byte(byte, start, end, fixed_body),
        }
    }

    /// Feed a burst of bytes. Returns the number of frames queued.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| self.on_byte(b)).count()
    }

    /// Abandon any partial frame.
    pub fn reset(&mut self) {
        self.begin_await();
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn on_line_byte(&mut self, byte: u8) -> bool {
        match self.state {
            RxState::AwaitStart | RxState::FrameDone => {
                if !is_terminator(byte) {
                    self.begin_frame();
                    self.append(byte);
                }
                false
            }
            RxState::Receiving => {
                if is_terminator(byte) {
                    self.complete()
                } else {
                    self.append(byte);
                    false
                }
            }
        }
    }

    fn on_delimited_byte(
        &mut self,
        byte: u8,
        start: u8,
        end: u8,
        fixed_body: Option<usize>,
    ) -> bool {
        match self.state {
            RxState::AwaitStart | RxState::FrameDone => {
                if byte == start {
                    self.begin_frame();
                }
                false
            }
            RxState::Receiving => {
                if self.buf.is_empty() && self.binary_len.is_none() && is_binary_type(byte) {
                    self.binary_len = fixed_body;
                }
                match self.binary_len {
                    Some(len) if self.buf.len() == len => {
                        if byte == end {
                            self.complete()
                        } else {
                            self.stats.framing_errors += 1;
                            self.begin_await();
                            false
                        }
                    }
                    Some(_) => {
                        self.append(byte);
                        false
                    }
                    None if byte == end => self.complete(),
                    None => {
                        self.append(byte);
                        false
                    }
                }
            }
        }
    }

    fn begin_frame(&mut self) {
        self.buf.clear();
        self.binary_len = None;
        self.state = RxState::Receiving;
    }

    fn begin_await(&mut self) {
        self.buf.clear();
        self.binary_len = None;
        self.state = RxState::AwaitStart;
    }

    fn append(&mut self, byte: u8) {
        if self.buf.push(byte).is_err() {
            // Frame longer than RX_FRAME_CAPACITY: discard it entirely.
            self.stats.overflows += 1;
            self.begin_await();
        }
    }

    fn complete(&mut self) -> bool {
        let frame = core::mem::take(&mut self.buf);
        self.binary_len = None;
        self.state = RxState::FrameDone;
        if self.queue.try_push(frame) {
            self.stats.completed += 1;
            true
        } else {
            self.stats.dropped_queue_full += 1;
            false
        }
    }
}

const _: () = assert!(BODY_LEN <= RX_FRAME_CAPACITY);
