//! Application core: reefer domain logic, zero I/O.
//!
//! The [`reefer::ReeferController`] drives the pump from temperature
//! samples and folds pump-on time into the persisted record. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod reefer;
