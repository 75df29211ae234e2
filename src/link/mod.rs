//! Byte-stream link layer shared by the modem UART and the inter-MCU bridge.
//!
//! ```text
//! UART RX ISR ──▶ FrameReceiver ──▶ FrameQueue ──▶ foreground loop
//!                 (per channel)      (bounded)      │
//!                                                   ├─▶ frame::decode_received (peer)
//!                                                   └─▶ AtEngine line wait      (modem)
//! ```
//!
//! - [`frame`]: fixed-layout inter-MCU envelope: encode, decode, dispatch
//! - [`receiver`]: ISR-side byte accumulator (line or sentinel framing)
//! - [`channels`]: bounded non-blocking frame queue
//! - [`transport`]: byte sink abstraction for the TX direction

pub mod channels;
pub mod frame;
pub mod receiver;
pub mod transport;
