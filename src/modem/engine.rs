//! Retry-driven AT command/response engine.
//!
//! `execute` renders a descriptor, writes it, then waits against a deadline
//! for a line the descriptor's classifier accepts:
//!
//! ```text
//!  attempt 1          attempt 2                 attempt N+1
//!  ├─ send ─ wait T ─┤ delay ├─ send ─ wait T ─┤ ... ├─ send ─ wait T ─┤ → NoResponse
//!         │                         │
//!     Accepted → Ok            ERROR → next attempt
//! ```
//!
//! Lines that answer nothing are parked in a small buffer so association
//! news arriving mid-command is not lost. The engine never owns a clock;
//! deadlines come from the [`Clock`] port passed to each call.

use core::str;

use embassy_time::{Duration, Instant};
use heapless::Deque;
use log::{debug, info, warn};

use super::command::{AtCommand, CommandTable, Line, Verdict};
use crate::app::ports::Clock;
use crate::config::TrackerConfig;
use crate::error::AtError;
use crate::link::channels::{FrameQueue, RxFrame};
use crate::link::transport::{Transport, write_all};

/// Lines held for the unsolicited path between service ticks.
pub const UNSOLICITED_DEPTH: usize = 4;

const TERMINATOR: &str = "\r\n";

/// Response window and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u8,
    pub retry_delay: Duration,
    pub poll_step: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(u64::from(cfg.at_timeout_ms)),
            max_retries: cfg.at_max_retries,
            retry_delay: Duration::from_millis(u64::from(cfg.at_retry_delay_ms)),
            poll_step: Duration::from_millis(u64::from(cfg.at_poll_step_ms)),
        }
    }
}

/// Result of a single attempt.
enum Attempt {
    Accepted,
    Rejected,
    TimedOut,
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

pub struct AtEngine<'q, T: Transport> {
    tx: T,
    rx: &'q FrameQueue,
    policy: RetryPolicy,
    unsolicited: Deque<RxFrame, UNSOLICITED_DEPTH>,
    transmissions: u32,
}

impl<'q, T: Transport> AtEngine<'q, T> {
    pub fn new(tx: T, rx: &'q FrameQueue, policy: RetryPolicy) -> Self {
        Self {
            tx,
            rx,
            policy,
            unsolicited: Deque::new(),
            transmissions: 0,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    pub fn transport(&self) -> &T {
        &self.tx
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Command lines written since construction, retries included.
    pub fn transmissions(&self) -> u32 {
        self.transmissions
    }

    /// Send `cmd` with the policy's retry budget and the descriptor's own
    /// timeout if it has one.
    pub fn run(&mut self, cmd: &AtCommand, clock: &mut impl Clock) -> Result<(), AtError> {
        let timeout = cmd.timeout.unwrap_or(self.policy.timeout);
        self.execute(cmd, clock, timeout, self.policy.max_retries)
    }

    /// Send `cmd` up to `max_retries + 1` times, waiting `timeout` for an
    /// accepted line after each transmission.
    pub fn execute(
        &mut self,
        cmd: &AtCommand,
        clock: &mut impl Clock,
        timeout: Duration,
        max_retries: u8,
    ) -> Result<(), AtError> {
        let mut line = Line::new();
        cmd.render(&mut line)?;
        line.push_str(TERMINATOR)
            .map_err(|()| AtError::LineTooLong)?;
        let text = line.trim_end();

        let mut rejected = false;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                clock.delay_ms(millis(self.policy.retry_delay));
            }
            self.park_stale_lines();

            self.transmissions = self.transmissions.wrapping_add(1);
            debug!(
                "AT: >> {} (attempt {}/{})",
                text,
                u16::from(attempt) + 1,
                u16::from(max_retries) + 1
            );
            write_all(&mut self.tx, line.as_bytes()).map_err(|e| {
                warn!("AT: write of '{}' failed: {:?}", text, e);
                AtError::Transport
            })?;

            match self.await_response(cmd, clock, timeout) {
                Attempt::Accepted => return Ok(()),
                Attempt::Rejected => {
                    warn!("AT: '{}' rejected", text);
                    rejected = true;
                }
                Attempt::TimedOut => {
                    warn!("AT: '{}' timed out after {} ms", text, timeout.as_millis());
                    rejected = false;
                }
            }
        }

        Err(if rejected {
            AtError::NegativeAck
        } else {
            AtError::NoResponse
        })
    }

    /// Run every step of `table` in order. Optional steps may fail; the
    /// first mandatory failure aborts with its index.
    pub fn configure_all(
        &mut self,
        table: &CommandTable,
        clock: &mut impl Clock,
    ) -> Result<(), AtError> {
        for (index, cmd) in table.steps().iter().enumerate() {
            match self.run(cmd, clock) {
                Ok(()) => debug!("AT: step {} {:?} ok", index, cmd.id),
                Err(e) if cmd.optional => {
                    warn!("AT: optional step {} {:?} failed: {}", index, cmd.id, e);
                }
                Err(e) => {
                    warn!("AT: step {} {:?} failed: {}", index, cmd.id, e);
                    return Err(AtError::StepFailed(index));
                }
            }
        }
        info!("AT: configuration complete ({} steps)", table.len());
        Ok(())
    }

    /// Next line that did not answer a command, oldest first.
    pub fn next_unsolicited(&mut self) -> Option<RxFrame> {
        self.unsolicited.pop_front().or_else(|| self.rx.try_pop())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn await_response(
        &mut self,
        cmd: &AtCommand,
        clock: &mut impl Clock,
        timeout: Duration,
    ) -> Attempt {
        let deadline: Instant = clock.now() + timeout;
        let step = millis(self.policy.poll_step).max(1);
        loop {
            while let Some(frame) = self.rx.try_pop() {
                let Ok(line) = str::from_utf8(&frame) else {
                    debug!("AT: dropping non-text line ({} bytes)", frame.len());
                    continue;
                };
                debug!("AT: << {}", line);
                match cmd.classify(line) {
                    Verdict::Accepted => return Attempt::Accepted,
                    Verdict::Rejected => return Attempt::Rejected,
                    Verdict::Unrelated => self.park(frame),
                }
            }
            if clock.now() >= deadline {
                return Attempt::TimedOut;
            }
            clock.delay_ms(step);
        }
    }

    fn park_stale_lines(&mut self) {
        while let Some(frame) = self.rx.try_pop() {
            self.park(frame);
        }
    }

    fn park(&mut self, frame: RxFrame) {
        if self.unsolicited.is_full() {
            if let Some(old) = self.unsolicited.pop_front() {
                warn!("AT: unsolicited buffer full, dropping {} byte line", old.len());
            }
        }
        self.unsolicited.push_back(frame).ok();
    }
}
