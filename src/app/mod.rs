//! Application core: pure domain logic, zero I/O.
//!
//! [`service::TrackerService`] owns the connectivity state machine, the AT
//! engine, the credential store and the telemetry timer. Each tick it drains
//! the modem and peer queues, steps the FSM and performs the actions the FSM
//! requested. Sensors, clock, storage and configuration are reached only
//! through the **port traits** in [`ports`], so the whole loop runs on the
//! host against simulated hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
