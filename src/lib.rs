//! PetTracker master-node library.
//!
//! Exposes the session core (frame codec, AT engine, credential store,
//! state machine, service) for the simulator binary, integration tests
//! and fuzzing. Board bring-up lives outside this crate; everything here
//! reaches hardware only through the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fsm;
pub mod link;
pub mod modem;
pub mod sensors;
pub mod telemetry;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
