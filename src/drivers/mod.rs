//! Actuator drivers and task plumbing.

pub mod pump;
pub mod task_pin;
pub mod watchdog;
