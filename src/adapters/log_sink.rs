//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured controller events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::ReeferEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ReeferEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ReeferEvent) {
        match event {
            ReeferEvent::Started(state) => {
                info!("START | initial_state={}", state.name());
            }
            ReeferEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.name(), to.name());
            }
            ReeferEvent::CycleCompleted {
                run_secs,
                total_runtime_secs,
                persisted,
            } => {
                info!(
                    "CYCLE | ran {}s | lifetime {}s | {}",
                    run_secs,
                    total_runtime_secs,
                    if *persisted { "saved" } else { "unsaved" }
                );
            }
            ReeferEvent::Status(s) => {
                info!(
                    "STATUS | {:.1},{} | state={} | setpoint={:.1}\u{00b1}{:.1} | session={}s lifetime={}s",
                    s.temperature,
                    if s.pump_on { "running" } else { "stopped" },
                    s.state.name(),
                    s.setpoint,
                    s.hysteresis,
                    s.session_runtime_secs,
                    s.total_runtime_secs,
                );
            }
            ReeferEvent::PersistFailed(e) => {
                warn!("NVM | persist failed: {}", e);
            }
            ReeferEvent::RuntimePersisted { total_runtime_secs } => {
                info!("NVM | runtime saved on retry | lifetime {}s", total_runtime_secs);
            }
        }
    }
}
