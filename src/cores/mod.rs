//! Core identity and the two cooperative core loops.
//!
//! - [`control::ControlCore`] runs on core 0: owns the pump relay, the
//!   persistent store and the command client.
//! - [`sensor::SensorCore`] runs on core 1: owns the probe and network
//!   collaborators and answers commands.
//!
//! Both loops dispatch a fixed set of phases round-robin by tick counter.

pub mod control;
pub mod sensor;

#[cfg(not(target_os = "espidf"))]
use core::cell::Cell;

/// ESP32-S3 CPU cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CoreId {
    /// Control and UI core; sole owner of flash writes.
    Core0 = 0,
    /// Sensor and network core.
    Core1 = 1,
}

/// The core executing the caller.
#[cfg(target_os = "espidf")]
pub fn current_core() -> CoreId {
    match esp_idf_hal::cpu::core() {
        esp_idf_hal::cpu::Core::Core0 => CoreId::Core0,
        _ => CoreId::Core1,
    }
}

#[cfg(not(target_os = "espidf"))]
thread_local! {
    static SIM_CORE: Cell<CoreId> = const { Cell::new(CoreId::Core0) };
}

/// The core executing the caller. On the host each thread is bound to a
/// simulated core, `Core0` unless [`bind_current_thread`] says otherwise.
#[cfg(not(target_os = "espidf"))]
pub fn current_core() -> CoreId {
    SIM_CORE.with(Cell::get)
}

/// Simulation: declare which core the calling thread stands in for.
#[cfg(not(target_os = "espidf"))]
pub fn bind_current_thread(core: CoreId) {
    SIM_CORE.with(|c| c.set(core));
}
