//! Shared mutable context threaded through every FSM handler.
//!
//! `ReeferContext` is the single struct that state handlers read from and
//! write to: the sample being evaluated, the setpoint band copied from the
//! persisted record, the dwell deadline and the pump command. The
//! controller fills the inputs before each tick and applies the outputs
//! after it.

use embassy_time::{Duration, Instant};

use crate::config::ReeferTiming;

pub struct ReeferContext {
    // -- Inputs (written by the controller before each tick) --
    /// Time of this evaluation.
    pub now: Instant,
    /// Latest probe temperature.
    pub temperature: f32,
    pub setpoint: f32,
    pub hysteresis: f32,

    // -- Configuration --
    pub timing: ReeferTiming,

    // -- Handler-owned state --
    /// When the current minimum-dwell timer expires.
    pub dwell_deadline: Instant,
    /// When the pump was last switched on.
    pub run_started: Option<Instant>,

    // -- Outputs (consumed by the controller after each tick) --
    /// Commanded pump relay state.
    pub pump_on: bool,
    /// Length of a chill cycle that ended this tick; taken by the controller.
    pub completed_run: Option<Duration>,
}

impl ReeferContext {
    pub fn new(timing: ReeferTiming, now: Instant) -> Self {
        Self {
            now,
            temperature: 0.0,
            setpoint: 0.0,
            hysteresis: 0.0,
            timing,
            dwell_deadline: now,
            run_started: None,
            pump_on: false,
            completed_run: None,
        }
    }

    /// Arm the dwell timer `ms` milliseconds from now.
    pub fn start_dwell(&mut self, ms: u64) {
        self.dwell_deadline = self.now + Duration::from_millis(ms);
    }

    pub fn dwell_elapsed(&self) -> bool {
        self.now >= self.dwell_deadline
    }

    /// Temperature has risen past the band: start cooling.
    pub fn above_band(&self) -> bool {
        self.temperature + self.hysteresis > self.setpoint
    }

    /// Temperature has fallen below the band: stop cooling.
    pub fn below_band(&self) -> bool {
        self.temperature + self.hysteresis < self.setpoint
    }

    /// Pump-on time so far in the current run.
    pub fn current_run(&self) -> Option<Duration> {
        self.run_started
            .and_then(|start| self.now.checked_duration_since(start))
    }
}
