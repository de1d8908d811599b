//! Integration tests for the two core loops sharing one channel.
//!
//! Both loops are stepped alternately on the test thread, one simulated
//! second per step, so the interleaving is deterministic. The sensor core
//! never parks here, which is exactly what a stalled peer looks like to a
//! persist on the control core.

use std::sync::Arc;

use embassy_time::{Duration, Instant};

use pilsner::adapters::flash::MemFlash;
use pilsner::app::commands::ReeferCommand;
use pilsner::app::reefer::ReeferController;
use pilsner::config::ReeferTiming;
use pilsner::cores::CoreId;
use pilsner::cores::control::ControlCore;
use pilsner::cores::sensor::SensorCore;
use pilsner::drivers::pump::PumpRelay;
use pilsner::error::StoreError;
use pilsner::fsm::StateId;
use pilsner::ipc::{CommandKind, CommandOutcome, FlashLockout, SharedStateChannel};
use pilsner::nvm::PersistentStore;

use crate::mock_hw::{
    MOCK_IP, MOCK_MAC, MockNetwork, MockPin, MockProbe, NetHandle, PinProbe, ProbeHandle,
    RecordingSink,
};

const SAMPLE_EVERY: u32 = 3;
const TIMEOUT_TICKS: u32 = 12;
const BUDGET: Duration = Duration::from_millis(5);

struct Rig<'a> {
    control: ControlCore<'a, MemFlash, MockPin, RecordingSink>,
    sensor: SensorCore<'a, MockNetwork, MockProbe>,
    pin: Arc<PinProbe>,
    probe: Arc<ProbeHandle>,
    net: Arc<NetHandle>,
    now_secs: u64,
}

impl<'a> Rig<'a> {
    fn new(ch: &'a SharedStateChannel, lk: &'a FlashLockout) -> Self {
        let (pin, pin_probe) = MockPin::new();
        let (probe, probe_handle) = MockProbe::new();
        let (net, net_handle) = MockNetwork::new();

        let store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, ch, lk, BUDGET);
        let reefer = ReeferController::new(PumpRelay::new(pin).unwrap(), ReeferTiming::default());
        let control = ControlCore::new(ch, store, reefer, RecordingSink::new(), TIMEOUT_TICKS);
        let sensor = SensorCore::new(ch, lk, net, probe, SAMPLE_EVERY);

        Self {
            control,
            sensor,
            pin: pin_probe,
            probe: probe_handle,
            net: net_handle,
            now_secs: 0,
        }
    }

    fn boot(&mut self) {
        self.sensor.boot().unwrap();
        self.control.start(Instant::from_secs(0));
    }

    fn step(&mut self) {
        self.sensor.tick();
        self.control.tick(Instant::from_secs(self.now_secs));
        self.now_secs += 1;
    }

    fn run(&mut self, steps: u32) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Step until the outstanding request resolves.
    fn finish_request(&mut self, max_steps: u32) -> Option<CommandOutcome> {
        for _ in 0..max_steps {
            self.step();
            if self.control.outstanding().is_none() {
                return self.control.last_outcome();
            }
        }
        None
    }
}

fn open_channel() -> SharedStateChannel {
    let ch = SharedStateChannel::new();
    ch.initialize().unwrap();
    ch
}

// ── Temperature path ──────────────────────────────────────────

#[test]
fn probe_sample_reaches_reefer_and_starts_chill() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.probe.set(70.0);
    rig.boot();

    rig.run(30);
    assert_eq!(rig.control.state(), StateId::Init, "startup delay holds");
    assert!(rig.control.working().temp_sample_count > 0);
    assert_eq!(rig.control.working().temperature, 70.0);

    rig.run(10);
    assert_eq!(rig.control.state(), StateId::ChillStart);
    assert!(rig.pin.is_high());
    assert!(rig.probe.reads() >= 10);
}

#[test]
fn missing_probe_never_starts_the_reefer() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.probe.disconnect();
    rig.boot();

    rig.run(120);
    assert!(rig.probe.reads() > 0);
    assert_eq!(rig.control.working().temp_sample_count, 0);
    assert_eq!(rig.control.state(), StateId::Init);
    assert!(!rig.pin.is_high());
}

#[test]
fn lost_probe_keeps_last_published_temperature() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.probe.set(61.5);
    rig.boot();
    rig.run(8);
    let count = rig.sensor.working().temp_sample_count;
    assert!(count > 0);

    rig.probe.disconnect();
    rig.run(30);
    assert_eq!(rig.control.working().temp_sample_count, count);
    assert_eq!(rig.control.working().temperature, 61.5);
}

// ── Remote calls ──────────────────────────────────────────────

#[test]
fn mac_and_scan_round_trip_through_both_loops() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.net.set_connected(true);
    rig.boot();

    rig.control.request(CommandKind::GetMac).unwrap();
    assert!(matches!(
        rig.finish_request(20),
        Some(CommandOutcome::Completed {
            kind: CommandKind::GetMac,
            ..
        })
    ));
    assert_eq!(rig.control.working().mac_address.as_str(), MOCK_MAC);

    rig.control.request(CommandKind::DoScan).unwrap();
    assert!(matches!(
        rig.finish_request(20),
        Some(CommandOutcome::Completed {
            kind: CommandKind::DoScan,
            ..
        })
    ));
    let scan = &rig.control.working().scan_result;
    assert_eq!(scan.len(), 2);
    assert_eq!(scan[0].ssid.as_str(), "brewhouse");
    assert_eq!(scan[1].rssi_dbm, -67);
    assert_eq!(rig.net.scans(), 1);
}

#[test]
fn second_request_waits_for_the_first() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.net.set_connected(true);
    rig.boot();

    rig.control.request(CommandKind::GetIp).unwrap();
    assert!(rig.control.request(CommandKind::GetMac).is_err());

    assert!(rig.finish_request(20).is_some());
    assert_eq!(rig.control.working().ip_address.as_str(), MOCK_IP);
    assert!(rig.control.request(CommandKind::GetMac).is_ok());
}

#[test]
fn request_while_offline_times_out() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.boot();

    rig.control.request(CommandKind::GetIp).unwrap();
    assert_eq!(
        rig.finish_request(40),
        Some(CommandOutcome::TimedOut {
            kind: CommandKind::GetIp
        })
    );
    assert!(rig.control.working().ip_address.is_empty());
}

#[test]
fn clock_sync_is_published_and_queryable() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.net.set_connected(true);
    rig.boot();
    assert!(!rig.control.working().clock_ready);

    rig.net.set_clock(Some(1_760_000_000));
    rig.run(8);
    assert!(rig.control.working().clock_ready);
    assert!(rig.net.polls() > 0);

    rig.control.request(CommandKind::GetClockTime).unwrap();
    assert!(matches!(
        rig.finish_request(20),
        Some(CommandOutcome::Completed {
            kind: CommandKind::GetClockTime,
            ..
        })
    ));
    assert_eq!(rig.control.working().clock_time, Some(1_760_000_000));
}

// ── Flash writes with an unresponsive peer ────────────────────

#[test]
fn save_fails_closed_when_sensor_core_does_not_park() {
    let ch = open_channel();
    let lk = FlashLockout::new();
    let mut rig = Rig::new(&ch, &lk);
    rig.boot();
    assert!(ch.core1_ready());

    rig.control
        .handle_command(ReeferCommand::SetSetpoint(60.0))
        .unwrap();
    assert_eq!(
        rig.control.handle_command(ReeferCommand::Save),
        Err(StoreError::LockoutTimeout)
    );
    assert_eq!(rig.control.store().flash().mutation_count(), 0);
    assert!(!lk.is_requested());

    // The loops carry on afterwards.
    rig.run(4);
    assert_eq!(rig.control.store().setpoint(), 60.0);
}
