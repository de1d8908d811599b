//! Reefer controller: closed-loop pump control around the FSM.
//!
//! [`ReeferController`] owns the state machine and the pump relay. Each
//! call to [`update`](ReeferController::update) evaluates one sample:
//!
//! ```text
//!  temperature ──▶ ┌───────────────────────────┐ ──▶ PumpRelay
//!  setpoint/hyst ─▶│ ReeferController (FSM)    │ ──▶ EventSink
//!  (PersistentStore)└───────────────────────────┘ ──▶ runtime → PersistentStore
//! ```
//!
//! A failed pump write is logged and retried on the next tick. A failed
//! runtime persist is reported once as an event; the accumulated runtime
//! stays in RAM and the write is retried every `persist_retry_ms` until
//! it lands.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::StatefulOutputPin;
use log::{debug, error, info, warn};

use crate::config::ReeferTiming;
use crate::drivers::pump::PumpRelay;
use crate::fsm::context::ReeferContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::nvm::PersistentStore;

use super::commands::ReeferCommand;
use super::events::{ReeferEvent, StatusReport};
use super::ports::{EventSink, FlashPort};
use crate::error::StoreError;

pub struct ReeferController<P> {
    fsm: Fsm,
    ctx: ReeferContext,
    pump: PumpRelay<P>,
    session_runtime_secs: u32,
    status_interval: Duration,
    last_status: Instant,
    persist_retry: Duration,
    next_persist_retry: Instant,
    pump_fault_logged: bool,
    started: bool,
}

impl<P: StatefulOutputPin> ReeferController<P> {
    /// Does **not** start the FSM. [`start`](Self::start) arms the startup
    /// delay; an [`update`](Self::update) without it starts at its own `now`.
    pub fn new(pump: PumpRelay<P>, timing: ReeferTiming) -> Self {
        let start = Instant::from_ticks(0);
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Init),
            ctx: ReeferContext::new(timing, start),
            pump,
            session_runtime_secs: 0,
            status_interval: Duration::from_millis(timing.status_log_interval_ms),
            last_status: start,
            persist_retry: Duration::from_millis(timing.persist_retry_ms),
            next_persist_retry: start,
            pump_fault_logged: false,
            started: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter `Init` at `now` and arm the startup delay.
    pub fn start(&mut self, now: Instant, sink: &mut impl EventSink) {
        self.ctx.now = now;
        self.last_status = now;
        self.started = true;
        self.fsm.start(&mut self.ctx);
        self.apply_pump();
        sink.emit(&ReeferEvent::Started(self.fsm.current_state()));
        info!("Reefer started in {}", self.state_name());
    }

    // ── Per-tick evaluation ───────────────────────────────────

    /// Evaluate one temperature sample at `now`.
    ///
    /// 1. Copy the setpoint band from the store
    /// 2. FSM tick (at most one transition)
    /// 3. Drive the pump relay to the commanded state
    /// 4. Fold a completed chill into the store and persist it, or retry a
    ///    persist that failed earlier once its back-off has elapsed
    /// 5. Periodic status report
    pub fn update<F: FlashPort>(
        &mut self,
        temperature: f32,
        now: Instant,
        store: &mut PersistentStore<'_, F>,
        sink: &mut impl EventSink,
    ) -> StateId {
        if !self.started {
            self.start(now, sink);
        }
        self.ctx.now = now;
        self.ctx.temperature = temperature;
        self.ctx.setpoint = store.setpoint();
        self.ctx.hysteresis = store.hysteresis();

        if let Some((from, to)) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&ReeferEvent::StateChanged { from, to });
        }

        self.apply_pump();

        if let Some(run) = self.ctx.current_run() {
            self.session_runtime_secs = run.as_secs() as u32;
        }

        if let Some(run) = self.ctx.completed_run.take() {
            self.fold_runtime(run, store, sink);
        } else if store.has_unsaved_runtime() && now >= self.next_persist_retry {
            self.retry_persist(store, sink);
        }

        if now.checked_duration_since(self.last_status).unwrap_or(Duration::from_ticks(0))
            >= self.status_interval
        {
            self.last_status = now;
            sink.emit(&ReeferEvent::Status(self.status(store)));
        }

        self.fsm.current_state()
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply a user command to the persisted configuration.
    ///
    /// Setters change RAM only; `Save` and `FactoryReset` write flash.
    pub fn handle_command<F: FlashPort>(
        &mut self,
        cmd: ReeferCommand<'_>,
        store: &mut PersistentStore<'_, F>,
    ) -> Result<(), StoreError> {
        match cmd {
            ReeferCommand::SetSetpoint(v) => {
                store.set_setpoint(v)?;
                info!("Setpoint -> {:.1}", v);
            }
            ReeferCommand::SetHysteresis(v) => {
                store.set_hysteresis(v)?;
                info!("Hysteresis -> {:.1}", v);
            }
            ReeferCommand::SetCredentials { ssid, passphrase } => {
                store.set_credentials(ssid, passphrase)?;
                info!("WiFi credentials updated (ssid '{}')", ssid);
            }
            ReeferCommand::SetTimezone(tz) => {
                store.set_timezone(tz)?;
                info!("Timezone -> {}", tz);
            }
            ReeferCommand::Save => store.persist()?,
            ReeferCommand::FactoryReset => {
                warn!("Factory reset requested");
                store.reset_to_defaults();
                store.persist()?;
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn state_name(&self) -> &'static str {
        self.fsm.current_state().name()
    }

    /// Last state successfully written to the relay.
    pub fn is_pump_running(&self) -> bool {
        self.pump.is_on()
    }

    /// Pump-on seconds not yet folded into the persisted record.
    pub fn session_runtime_secs(&self) -> u32 {
        self.session_runtime_secs
    }

    /// When the current dwell timer expires.
    pub fn dwell_deadline(&self) -> Instant {
        self.ctx.dwell_deadline
    }

    pub fn status<F: FlashPort>(&self, store: &PersistentStore<'_, F>) -> StatusReport {
        StatusReport {
            state: self.fsm.current_state(),
            temperature: self.ctx.temperature,
            setpoint: store.setpoint(),
            hysteresis: store.hysteresis(),
            pump_on: self.pump.is_on(),
            session_runtime_secs: self.session_runtime_secs,
            total_runtime_secs: store.accumulated_runtime_secs(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_pump(&mut self) {
        let want = self.ctx.pump_on;
        if self.pump.is_on() == want && !self.pump_fault_logged {
            return;
        }
        match self.pump.set(want) {
            Ok(()) => {
                if self.pump_fault_logged {
                    info!("Pump relay recovered");
                    self.pump_fault_logged = false;
                }
                info!(
                    "Pump {} (T={:.1}, setpoint={:.1})",
                    if want { "ON" } else { "OFF" },
                    self.ctx.temperature,
                    self.ctx.setpoint
                );
            }
            Err(e) => {
                if !self.pump_fault_logged {
                    error!("Pump relay write failed: {} (retrying each tick)", e);
                    self.pump_fault_logged = true;
                }
            }
        }
    }

    fn fold_runtime<F: FlashPort>(
        &mut self,
        run: Duration,
        store: &mut PersistentStore<'_, F>,
        sink: &mut impl EventSink,
    ) {
        let run_secs = run.as_secs() as u32;
        store.accumulate_runtime(run_secs);
        self.session_runtime_secs = 0;

        let persisted = match store.persist() {
            Ok(()) => true,
            Err(e) => {
                warn!("Runtime persist failed: {} (retrying)", e);
                sink.emit(&ReeferEvent::PersistFailed(e));
                self.schedule_persist_retry();
                false
            }
        };
        info!(
            "Chill cycle ran {}s, lifetime {}s",
            run_secs,
            store.accumulated_runtime_secs()
        );
        sink.emit(&ReeferEvent::CycleCompleted {
            run_secs,
            total_runtime_secs: store.accumulated_runtime_secs(),
            persisted,
        });
    }

    fn retry_persist<F: FlashPort>(
        &mut self,
        store: &mut PersistentStore<'_, F>,
        sink: &mut impl EventSink,
    ) {
        match store.persist() {
            Ok(()) => {
                let total_runtime_secs = store.accumulated_runtime_secs();
                info!("Runtime persisted on retry, lifetime {}s", total_runtime_secs);
                sink.emit(&ReeferEvent::RuntimePersisted { total_runtime_secs });
            }
            Err(e) => {
                debug!("Runtime persist retry failed: {}", e);
                self.schedule_persist_retry();
            }
        }
    }

    fn schedule_persist_retry(&mut self) {
        self.next_persist_retry = self
            .ctx
            .now
            .checked_add(self.persist_retry)
            .unwrap_or(Instant::MAX);
    }
}
