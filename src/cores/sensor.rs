//! Sensor core (core 1) main loop.
//!
//! Owns the network and probe collaborators. The flash lockout is serviced
//! before every phase, so a persist on core 0 waits at most one phase.
//!
//! ```text
//!  tick % 3 ─┬─ 0 Serve    answer the pending remote call
//!            ├─ 1 Sample   probe read, every `sample_every` ticks
//!            └─ 2 Network  reconnect / clock sync, republish flags
//! ```

use log::{debug, error, info, warn};

use crate::app::ports::{NetworkPort, ProbePort};
use crate::error::ChannelError;
use crate::ipc::{CommandKind, FlashLockout, SharedState, SharedStateChannel, UpdateMask, serve_command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorPhase {
    Serve,
    Sample,
    Network,
}

impl SensorPhase {
    pub const COUNT: u32 = 3;

    fn for_tick(tick: u32) -> Self {
        match tick % Self::COUNT {
            0 => Self::Serve,
            1 => Self::Sample,
            _ => Self::Network,
        }
    }
}

pub struct SensorCore<'a, N, P> {
    channel: &'a SharedStateChannel,
    lockout: &'a FlashLockout,
    working: SharedState,
    network: N,
    probe: P,
    tick: u32,
    sample_every: u32,
    since_sample: u32,
    parks: u32,
    channel_warned: bool,
}

impl<'a, N: NetworkPort, P: ProbePort> SensorCore<'a, N, P> {
    pub fn new(
        channel: &'a SharedStateChannel,
        lockout: &'a FlashLockout,
        network: N,
        probe: P,
        sample_every_ticks: u32,
    ) -> Self {
        let sample_every = sample_every_ticks.max(1);
        Self {
            channel,
            lockout,
            working: SharedState::new(),
            network,
            probe,
            tick: 0,
            sample_every,
            // The first sample is taken on the first Sample phase.
            since_sample: sample_every,
            parks: 0,
            channel_warned: false,
        }
    }

    /// Announce the core and its initial connectivity in one exchange.
    pub fn boot(&mut self) -> Result<(), ChannelError> {
        let w = &mut self.working;
        w.core1_ready = true;
        w.wifi_connected = self.network.is_connected();
        w.clock_time = self.network.clock_time();
        w.clock_ready = w.clock_time.is_some();
        w.mac_address = self.network.mac_address();

        let res = self.channel.exchange(
            UpdateMask::CORE1_READY
                | UpdateMask::WIFI_CONNECTED
                | UpdateMask::CLOCK_READY
                | UpdateMask::CLOCK_TIME
                | UpdateMask::MAC_ADDR,
            &mut self.working,
        );
        match res {
            Ok(()) => info!(
                "core1: ready (wifi {}, clock {})",
                if self.working.wifi_connected { "up" } else { "down" },
                if self.working.clock_ready { "set" } else { "unset" }
            ),
            Err(e) => error!("core1: boot exchange failed: {}", e),
        }
        res
    }

    /// Run the phase due on this tick and advance the counter.
    pub fn tick(&mut self) -> SensorPhase {
        if self.lockout.service() {
            self.parks = self.parks.wrapping_add(1);
        }
        self.since_sample = self.since_sample.saturating_add(1);

        let phase = SensorPhase::for_tick(self.tick);
        let res = match phase {
            SensorPhase::Serve => self.serve(),
            SensorPhase::Sample => self.sample(),
            SensorPhase::Network => self.network(),
        };
        self.note_channel(res);
        self.tick = self.tick.wrapping_add(1);
        phase
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn working(&self) -> &SharedState {
        &self.working
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    /// How many times this core has parked for a flash write.
    pub fn parks(&self) -> u32 {
        self.parks
    }

    pub fn ticks(&self) -> u32 {
        self.tick
    }

    // ── Phases ────────────────────────────────────────────────

    fn serve(&mut self) -> Result<(), ChannelError> {
        self.channel.exchange(UpdateMask::NONE, &mut self.working)?;

        let network = &mut self.network;
        let served = serve_command(self.channel, &mut self.working, |kind, w| {
            let connected = network.is_connected();
            match kind {
                CommandKind::GetIp if connected => {
                    w.ip_address = network.ip_address().unwrap_or_default();
                    Some(UpdateMask::IP_ADDR)
                }
                CommandKind::GetMac if connected => {
                    w.mac_address = network.mac_address();
                    Some(UpdateMask::MAC_ADDR)
                }
                CommandKind::DoScan if connected => {
                    info!("core1: starting network scan");
                    w.scan_result.clear();
                    network.scan(&mut w.scan_result);
                    Some(UpdateMask::SCAN_DATA)
                }
                CommandKind::GetClockTime => {
                    let t = network.clock_time()?;
                    w.clock_time = Some(t);
                    w.clock_ready = true;
                    Some(UpdateMask::CLOCK_TIME | UpdateMask::CLOCK_READY)
                }
                _ => None,
            }
        })?;

        if let Some(kind) = served {
            debug!("core1: served {}", kind.label());
        }
        Ok(())
    }

    fn sample(&mut self) -> Result<(), ChannelError> {
        if self.since_sample < self.sample_every {
            return Ok(());
        }
        self.since_sample = 0;

        let Some(temp) = self.probe.read_temperature() else {
            debug!("core1: no probe sample");
            return Ok(());
        };
        self.working.temperature = temp;
        self.working.temp_sample_count = self.working.temp_sample_count.wrapping_add(1);
        self.channel.exchange(UpdateMask::TEMPERATURE, &mut self.working)
    }

    fn network(&mut self) -> Result<(), ChannelError> {
        self.network.poll();

        let mut dirty = UpdateMask::NONE;
        let connected = self.network.is_connected();
        if connected != self.working.wifi_connected {
            info!("core1: wifi {}", if connected { "connected" } else { "lost" });
            self.working.wifi_connected = connected;
            dirty |= UpdateMask::WIFI_CONNECTED;
        }

        let clock = self.network.clock_time();
        if clock.is_some() != self.working.clock_ready {
            self.working.clock_ready = clock.is_some();
            dirty |= UpdateMask::CLOCK_READY;
        }
        if clock.is_some() {
            self.working.clock_time = clock;
            dirty |= UpdateMask::CLOCK_TIME;
        }

        self.channel.exchange(dirty, &mut self.working)
    }

    fn note_channel(&mut self, res: Result<(), ChannelError>) {
        match res {
            Ok(()) => self.channel_warned = false,
            Err(e) if !self.channel_warned => {
                warn!("core1: exchange failed: {}", e);
                self.channel_warned = true;
            }
            Err(_) => {}
        }
    }
}
