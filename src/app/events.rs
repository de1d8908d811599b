//! Outbound controller events.
//!
//! The [`ReeferController`](super::reefer::ReeferController) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them.

use crate::error::StoreError;
use crate::fsm::StateId;

#[derive(Debug, Clone, PartialEq)]
pub enum ReeferEvent {
    /// The controller has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A chill cycle finished and its runtime was folded into the record.
    CycleCompleted {
        run_secs: u32,
        total_runtime_secs: u32,
        persisted: bool,
    },

    /// Periodic status line.
    Status(StatusReport),

    /// A record write failed; the change stays in RAM.
    PersistFailed(StoreError),

    /// Runtime left unsaved by an earlier failure reached flash.
    RuntimePersisted { total_runtime_secs: u32 },
}

/// A point-in-time controller snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub state: StateId,
    pub temperature: f32,
    pub setpoint: f32,
    pub hysteresis: f32,
    pub pump_on: bool,
    pub session_runtime_secs: u32,
    pub total_runtime_secs: u32,
}
