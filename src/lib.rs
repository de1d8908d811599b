//! Pilsner reefer controller library.
//!
//! Two cooperative core loops share one [`ipc::SharedStateChannel`]:
//! core 0 runs the reefer FSM and owns the persisted record in program
//! flash, core 1 owns the probe and the network. Everything here builds
//! and tests on the host; ESP-IDF code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod cores;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod ipc;
pub mod nvm;
pub mod pins;
