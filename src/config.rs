//! System configuration parameters
//!
//! Compiled-in tunables for the reefer controller and the two core loops.
//! User-facing settings (setpoint, hysteresis, credentials, timezone) live
//! in the persisted record instead; see [`crate::nvm::record`].

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    pub reefer: ReeferTiming,
    pub loops: LoopTiming,
}

/// Dwell and reporting intervals for the pump state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReeferTiming {
    /// Hold-off after boot before the controller may start the pump
    pub startup_delay_ms: u64,
    /// Minimum pump-on time once a chill starts
    pub min_run_ms: u64,
    /// Minimum pump-off time once a chill ends
    pub min_off_ms: u64,
    /// Period of the temperature / pump status line
    pub status_log_interval_ms: u64,
    /// Wait between attempts to write a cycle's runtime that failed to persist
    pub persist_retry_ms: u64,
}

impl Default for ReeferTiming {
    fn default() -> Self {
        Self {
            startup_delay_ms: 30_000,
            min_run_ms: 60_000,
            min_off_ms: 60_000,
            status_log_interval_ms: 15 * 60 * 1000,
            persist_retry_ms: 30_000,
        }
    }
}

/// Cooperative loop pacing on both cores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoopTiming {
    /// Loop tick period (milliseconds), both cores
    pub tick_ms: u32,
    /// Probe sampled every N sensor-core ticks
    pub sample_every_ticks: u32,
    /// Control-core ticks before an unanswered command is abandoned
    pub command_timeout_ticks: u32,
    /// How long the flash owner waits for the peer to park. Must exceed
    /// the longest blocking sensor-core phase and stay under the watchdog.
    pub lockout_timeout_ms: u32,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            tick_ms: 1,
            sample_every_ticks: 500,
            command_timeout_ticks: 5_000,
            lockout_timeout_ms: 5_000,
        }
    }
}

impl SystemConfig {
    /// Reject configurations the loops cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.loops.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be non-zero"));
        }
        if self.loops.sample_every_ticks == 0 {
            return Err(Error::Config("sample_every_ticks must be non-zero"));
        }
        if self.loops.command_timeout_ticks == 0 {
            return Err(Error::Config("command_timeout_ticks must be non-zero"));
        }
        if self.loops.lockout_timeout_ms == 0 {
            return Err(Error::Config("lockout_timeout_ms must be non-zero"));
        }
        if self.reefer.status_log_interval_ms == 0 {
            return Err(Error::Config("status_log_interval_ms must be non-zero"));
        }
        if self.reefer.persist_retry_ms == 0 {
            return Err(Error::Config("persist_retry_ms must be non-zero"));
        }
        Ok(())
    }
}
