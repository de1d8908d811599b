//! Control core (core 0) main loop.
//!
//! ```text
//!  tick % 4 ─┬─ 0 Refresh      read-only exchange
//!            ├─ 1 Commands     poll the outstanding remote call
//!            ├─ 2 Temperature  log fresh probe samples
//!            └─ 3 Control      feed the latest sample to the reefer
//! ```
//!
//! Each phase does one bounded piece of work; the caller paces ticks at
//! the configured loop period.

use embassy_time::Instant;
use embedded_hal::digital::StatefulOutputPin;
use log::{error, info, warn};

use crate::app::commands::ReeferCommand;
use crate::app::ports::{EventSink, FlashPort};
use crate::app::reefer::ReeferController;
use crate::error::{ChannelError, CommandError, StoreError};
use crate::fsm::StateId;
use crate::ipc::{CommandClient, CommandKind, CommandOutcome, SharedState, SharedStateChannel, UpdateMask};
use crate::nvm::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlPhase {
    Refresh,
    Commands,
    Temperature,
    Control,
}

impl ControlPhase {
    pub const COUNT: u32 = 4;

    fn for_tick(tick: u32) -> Self {
        match tick % Self::COUNT {
            0 => Self::Refresh,
            1 => Self::Commands,
            2 => Self::Temperature,
            _ => Self::Control,
        }
    }
}

pub struct ControlCore<'a, F: FlashPort, P, S> {
    channel: &'a SharedStateChannel,
    working: SharedState,
    store: PersistentStore<'a, F>,
    reefer: ReeferController<P>,
    client: CommandClient,
    sink: S,
    tick: u32,
    last_sample: Option<(u32, f32)>,
    last_outcome: Option<CommandOutcome>,
    channel_warned: bool,
}

impl<'a, F, P, S> ControlCore<'a, F, P, S>
where
    F: FlashPort,
    P: StatefulOutputPin,
    S: EventSink,
{
    pub fn new(
        channel: &'a SharedStateChannel,
        store: PersistentStore<'a, F>,
        reefer: ReeferController<P>,
        sink: S,
        command_timeout_ticks: u32,
    ) -> Self {
        Self {
            channel,
            working: SharedState::new(),
            store,
            reefer,
            client: CommandClient::new(command_timeout_ticks),
            sink,
            tick: 0,
            last_sample: None,
            last_outcome: None,
            channel_warned: false,
        }
    }

    /// Start the reefer FSM and take the first snapshot.
    pub fn start(&mut self, now: Instant) {
        self.reefer.start(now, &mut self.sink);
        self.refresh();
    }

    /// Run the phase due on this tick and advance the counter.
    pub fn tick(&mut self, now: Instant) -> ControlPhase {
        let phase = ControlPhase::for_tick(self.tick);
        match phase {
            ControlPhase::Refresh => self.refresh(),
            ControlPhase::Commands => self.poll_commands(),
            ControlPhase::Temperature => self.log_temperature(),
            ControlPhase::Control => self.run_control(now),
        }
        self.tick = self.tick.wrapping_add(1);
        phase
    }

    /// Queue a remote call to the sensor core.
    pub fn request(&mut self, kind: CommandKind) -> Result<u16, CommandError> {
        info!("cmd: asking for {}", kind.label());
        self.client
            .send(kind, self.tick, self.channel, &mut self.working)
    }

    /// Apply a user command through the reefer controller.
    pub fn handle_command(&mut self, cmd: ReeferCommand<'_>) -> Result<(), StoreError> {
        self.reefer.handle_command(cmd, &mut self.store)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn working(&self) -> &SharedState {
        &self.working
    }

    pub fn reefer(&self) -> &ReeferController<P> {
        &self.reefer
    }

    pub fn store(&self) -> &PersistentStore<'a, F> {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> StateId {
        self.reefer.state()
    }

    pub fn outstanding(&self) -> Option<CommandKind> {
        self.client.outstanding()
    }

    /// Result of the most recently finished remote call.
    pub fn last_outcome(&self) -> Option<CommandOutcome> {
        self.last_outcome
    }

    pub fn ticks(&self) -> u32 {
        self.tick
    }

    // ── Phases ────────────────────────────────────────────────

    fn refresh(&mut self) {
        let res = self.channel.exchange(UpdateMask::NONE, &mut self.working);
        self.note_channel(res);
    }

    fn poll_commands(&mut self) {
        match self.client.poll(self.tick, self.channel, &mut self.working) {
            Ok(Some(outcome)) => {
                self.report(outcome);
                self.last_outcome = Some(outcome);
            }
            Ok(None) => {}
            Err(e) => self.note_channel(Err(e)),
        }
    }

    fn log_temperature(&mut self) {
        let count = self.working.temp_sample_count;
        if count == 0 {
            return;
        }
        let temp = self.working.temperature;
        match self.last_sample {
            Some((c, t)) if c == count || t == temp => {}
            _ => info!("temp: {:.1}", temp),
        }
        self.last_sample = Some((count, temp));
    }

    fn run_control(&mut self, now: Instant) {
        if self.working.temp_sample_count == 0 {
            return;
        }
        self.reefer
            .update(self.working.temperature, now, &mut self.store, &mut self.sink);
    }

    fn report(&self, outcome: CommandOutcome) {
        let (kind, elapsed) = match outcome {
            CommandOutcome::TimedOut { kind } => {
                warn!("cmd: {} timed out", kind.label());
                return;
            }
            CommandOutcome::Completed { kind, elapsed_ticks } => (kind, elapsed_ticks),
        };
        let w = &self.working;
        match kind {
            CommandKind::GetIp => info!("cmd: got IP {} in {} ticks", w.ip_address, elapsed),
            CommandKind::GetMac => info!("cmd: got MAC {} in {} ticks", w.mac_address, elapsed),
            CommandKind::GetClockTime => match w.clock_time {
                Some(t) => info!("cmd: clock {} in {} ticks", t, elapsed),
                None => info!("cmd: clock not set ({} ticks)", elapsed),
            },
            CommandKind::DoScan => {
                info!("cmd: scan done in {} ticks, {} access points", elapsed, w.scan_result.len());
                for ap in &w.scan_result {
                    info!(
                        "  {} [{}] {}dBm ch{} {}",
                        ap.ssid, ap.bssid, ap.rssi_dbm, ap.channel, ap.encryption
                    );
                }
            }
            CommandKind::NoCommand => {}
        }
    }

    fn note_channel(&mut self, res: Result<(), ChannelError>) {
        match res {
            Ok(()) => self.channel_warned = false,
            Err(e) if !self.channel_warned => {
                error!("ipc: exchange failed: {}", e);
                self.channel_warned = true;
            }
            Err(_) => {}
        }
    }
}
