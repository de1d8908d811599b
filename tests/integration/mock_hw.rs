//! Mock hardware adapters for integration tests.
//!
//! Every mock keeps its observable state behind an `Arc`, so a test can
//! hold a handle after moving the mock into a controller or onto another
//! thread.

#![allow(dead_code)]

use core::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin, StatefulOutputPin};
use heapless::String;

use pilsner::app::events::ReeferEvent;
use pilsner::app::ports::{EventSink, NetworkPort, ProbePort};
use pilsner::ipc::AccessPoint;
use pilsner::ipc::state::ScanList;

// ── Pump relay pin ────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PinFault;

impl embedded_hal::digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Default)]
pub struct PinProbe {
    level: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU32,
}

impl PinProbe {
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful level changes (set_high / set_low calls that stuck).
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Relay output pin whose writes can be made to fail.
pub struct MockPin {
    probe: Arc<PinProbe>,
}

impl MockPin {
    pub fn new() -> (Self, Arc<PinProbe>) {
        let probe = Arc::new(PinProbe::default());
        (Self { probe: probe.clone() }, probe)
    }

    fn write(&mut self, high: bool) -> Result<(), PinFault> {
        if self.probe.fail_writes.load(Ordering::SeqCst) {
            return Err(PinFault);
        }
        self.probe.level.store(high, Ordering::SeqCst);
        self.probe.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = PinFault;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), PinFault> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        self.write(true)
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> Result<bool, PinFault> {
        Ok(self.probe.is_high())
    }

    fn is_set_low(&mut self) -> Result<bool, PinFault> {
        Ok(!self.probe.is_high())
    }
}

// ── Event sink ────────────────────────────────────────────────

/// Records every emitted event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ReeferEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<(pilsner::fsm::StateId, pilsner::fsm::StateId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReeferEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn status_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ReeferEvent::Status(_)))
            .count()
    }

    pub fn cycles(&self) -> Vec<(u32, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReeferEvent::CycleCompleted { run_secs, persisted, .. } => Some((*run_secs, *persisted)),
                _ => None,
            })
            .collect()
    }

    pub fn persist_failures(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ReeferEvent::PersistFailed(_)))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ReeferEvent) {
        self.events.push(event.clone());
    }
}

// ── Temperature probe ─────────────────────────────────────────

#[derive(Default)]
pub struct ProbeHandle {
    bits: AtomicU32,
    valid: AtomicBool,
    reads: AtomicU32,
}

impl ProbeHandle {
    pub fn set(&self, temp: f32) {
        self.bits.store(temp.to_bits(), Ordering::SeqCst);
        self.valid.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

pub struct MockProbe {
    handle: Arc<ProbeHandle>,
}

impl MockProbe {
    pub fn new() -> (Self, Arc<ProbeHandle>) {
        let handle = Arc::new(ProbeHandle::default());
        (Self { handle: handle.clone() }, handle)
    }
}

impl ProbePort for MockProbe {
    fn read_temperature(&mut self) -> Option<f32> {
        self.handle.reads.fetch_add(1, Ordering::SeqCst);
        self.handle
            .valid
            .load(Ordering::SeqCst)
            .then(|| f32::from_bits(self.handle.bits.load(Ordering::SeqCst)))
    }
}

// ── Network ───────────────────────────────────────────────────

#[derive(Default)]
pub struct NetHandle {
    connected: AtomicBool,
    clock: Mutex<Option<u64>>,
    polls: AtomicU32,
    scans: AtomicU32,
}

impl NetHandle {
    pub fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }

    pub fn set_clock(&self, t: Option<u64>) {
        *self.clock.lock().unwrap() = t;
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> u32 {
        self.scans.load(Ordering::SeqCst)
    }
}

pub const MOCK_IP: &str = "192.168.7.41";
pub const MOCK_MAC: &str = "24:0a:c4:5e:a1:ed";

pub struct MockNetwork {
    handle: Arc<NetHandle>,
}

impl MockNetwork {
    pub fn new() -> (Self, Arc<NetHandle>) {
        let handle = Arc::new(NetHandle::default());
        (Self { handle: handle.clone() }, handle)
    }
}

impl NetworkPort for MockNetwork {
    fn is_connected(&self) -> bool {
        self.handle.connected.load(Ordering::SeqCst)
    }

    fn poll(&mut self) {
        self.handle.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn ip_address(&self) -> Option<String<16>> {
        self.is_connected().then(|| String::try_from(MOCK_IP).unwrap())
    }

    fn mac_address(&self) -> String<18> {
        String::try_from(MOCK_MAC).unwrap()
    }

    fn scan(&mut self, out: &mut ScanList) {
        self.handle.scans.fetch_add(1, Ordering::SeqCst);
        for (ssid, rssi) in [("brewhouse", -42), ("cellar", -67)] {
            let _ = out.push(AccessPoint {
                ssid: String::try_from(ssid).unwrap(),
                bssid: String::try_from("00:11:22:33:44:55").unwrap(),
                rssi_dbm: rssi,
                channel: 6,
                encryption: String::try_from("WPA2").unwrap(),
            });
        }
    }

    fn clock_time(&self) -> Option<u64> {
        *self.handle.clock.lock().unwrap()
    }
}

/// A pin that never fails, for tests that do not care about the relay.
#[derive(Default)]
pub struct QuietPin(bool);

impl ErrorType for QuietPin {
    type Error = Infallible;
}

impl OutputPin for QuietPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0 = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0 = true;
        Ok(())
    }
}

impl StatefulOutputPin for QuietPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0)
    }
}
