//! Integration tests for the ReeferController → pump relay → store pipeline.
//!
//! Time is driven explicitly, one sample per simulated second.

use std::sync::Arc;

use embassy_time::{Duration, Instant};

use pilsner::adapters::flash::MemFlash;
use pilsner::app::commands::ReeferCommand;
use pilsner::app::events::ReeferEvent;
use pilsner::app::reefer::ReeferController;
use pilsner::config::ReeferTiming;
use pilsner::cores::CoreId;
use pilsner::drivers::pump::PumpRelay;
use pilsner::fsm::StateId;
use pilsner::ipc::{FlashLockout, SharedStateChannel};
use pilsner::nvm::{LoadOutcome, PersistentStore};

use crate::mock_hw::{MockPin, PinProbe, RecordingSink};

const BUDGET: Duration = Duration::from_millis(50);

fn secs(s: u64) -> Instant {
    Instant::from_millis(s * 1000)
}

fn channel() -> SharedStateChannel {
    let ch = SharedStateChannel::new();
    ch.initialize().unwrap();
    ch
}

fn reefer() -> (ReeferController<MockPin>, Arc<PinProbe>) {
    let (pin, probe) = MockPin::new();
    let pump = PumpRelay::new(pin).unwrap();
    (ReeferController::new(pump, ReeferTiming::default()), probe)
}

// ── Chill cycle against the default 65 / 1 band ──────────────

#[test]
fn chill_cycle_drives_relay_and_persists_runtime_once() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(store.load(), Ok(LoadOutcome::Restored));
    let baseline = store.persist_count();

    let (mut reefer, pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);
    assert!(!pin.is_high());

    // Warm, but still inside the startup delay.
    reefer.update(70.0, secs(10), &mut store, &mut sink);
    assert_eq!(reefer.state(), StateId::Init);
    assert!(!pin.is_high());

    reefer.update(60.0, secs(30), &mut store, &mut sink);
    reefer.update(67.0, secs(31), &mut store, &mut sink);
    assert_eq!(reefer.state(), StateId::ChillStart);
    assert!(pin.is_high());

    reefer.update(66.0, secs(91), &mut store, &mut sink);
    reefer.update(63.0, secs(120), &mut store, &mut sink);
    assert_eq!(reefer.state(), StateId::PostChill);
    assert!(!pin.is_high());

    assert_eq!(store.accumulated_runtime_secs(), 89);
    assert_eq!(store.persist_count(), baseline + 1);
    assert_eq!(sink.cycles(), vec![(89, true)]);
    assert_eq!(
        sink.transitions(),
        vec![
            (StateId::Init, StateId::Idle),
            (StateId::Idle, StateId::ChillStart),
            (StateId::ChillStart, StateId::Chilling),
            (StateId::Chilling, StateId::PostChill),
        ]
    );
}

#[test]
fn runtime_survives_reboot() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.load().unwrap();

    let (mut reefer, _pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);
    reefer.update(60.0, secs(30), &mut store, &mut sink);
    reefer.update(70.0, secs(40), &mut store, &mut sink);
    reefer.update(70.0, secs(100), &mut store, &mut sink);
    reefer.update(60.0, secs(160), &mut store, &mut sink);
    assert_eq!(store.accumulated_runtime_secs(), 120);

    // Power cycle: a fresh store over the same flash.
    let mut rebooted = PersistentStore::new(store.into_flash(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(rebooted.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(rebooted.accumulated_runtime_secs(), 120);
}

#[test]
fn pump_write_failure_is_retried_next_tick() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    let (mut reefer, pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);
    reefer.update(60.0, secs(30), &mut store, &mut sink);

    pin.fail_writes(true);
    reefer.update(70.0, secs(31), &mut store, &mut sink);
    assert_eq!(reefer.state(), StateId::ChillStart);
    assert!(!reefer.is_pump_running());
    assert!(!pin.is_high());

    // Still failing: state holds, relay stays as it was.
    reefer.update(70.0, secs(32), &mut store, &mut sink);
    assert!(!pin.is_high());

    pin.fail_writes(false);
    reefer.update(70.0, secs(33), &mut store, &mut sink);
    assert!(reefer.is_pump_running());
    assert!(pin.is_high());
    assert_eq!(reefer.state(), StateId::ChillStart);
}

#[test]
fn persist_failure_keeps_runtime_in_ram_until_next_save() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.load().unwrap();
    let (mut reefer, _pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);
    reefer.update(60.0, secs(30), &mut store, &mut sink);
    reefer.update(70.0, secs(31), &mut store, &mut sink);
    reefer.update(70.0, secs(91), &mut store, &mut sink);

    store.flash_mut().fail_erases(true);
    reefer.update(60.0, secs(101), &mut store, &mut sink);
    assert_eq!(reefer.state(), StateId::PostChill);
    assert_eq!(sink.persist_failures(), 1);
    assert_eq!(sink.cycles(), vec![(70, false)]);
    assert_eq!(store.accumulated_runtime_secs(), 70);

    store.flash_mut().fail_erases(false);
    reefer.handle_command(ReeferCommand::Save, &mut store).unwrap();

    let mut rebooted = PersistentStore::new(store.into_flash(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(rebooted.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(rebooted.accumulated_runtime_secs(), 70);
}

// ── Anti-chatter ─────────────────────────────────────────────

/// Temperature flips across the band every second for twenty minutes.
/// No pump-on or pump-off period may be shorter than a minute.
#[test]
fn oscillating_temperature_never_chatters_the_relay() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    let (mut reefer, pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);

    let mut last_level = false;
    let mut last_edge = 0u64;
    let mut edges = 0;
    for t in 1..=1200u64 {
        let temp = if t % 2 == 0 { 70.0 } else { 60.0 };
        reefer.update(temp, secs(t), &mut store, &mut sink);

        let level = pin.is_high();
        if level != last_level {
            let held = t - last_edge;
            assert!(held >= 30, "first level held only {held}s");
            if edges > 0 {
                assert!(held >= 60, "level held only {held}s before flipping at t={t}");
            }
            last_level = level;
            last_edge = t;
            edges += 1;
        }
    }

    assert!(edges >= 10, "expected repeated cycling, saw {edges} edges");
    let cycles = sink.cycles();
    assert_eq!(store.persist_count() as usize, cycles.len());
    assert!(cycles.iter().all(|&(run, persisted)| run >= 60 && persisted));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn setpoint_command_is_ram_only_until_saved() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.load().unwrap();
    let mutations = store.flash().mutation_count();
    let (mut reefer, _pin) = reefer();

    reefer
        .handle_command(ReeferCommand::SetSetpoint(55.0), &mut store)
        .unwrap();
    reefer
        .handle_command(ReeferCommand::SetTimezone("CET-1CEST"), &mut store)
        .unwrap();
    assert_eq!(store.flash().mutation_count(), mutations);

    reefer.handle_command(ReeferCommand::Save, &mut store).unwrap();
    assert!(store.flash().mutation_count() > mutations);

    let mut rebooted = PersistentStore::new(store.into_flash(), CoreId::Core0, &ch, &lk, BUDGET);
    rebooted.load().unwrap();
    assert_eq!(rebooted.setpoint(), 55.0);
    assert_eq!(rebooted.timezone(), "CET-1CEST");
}

#[test]
fn oversized_credentials_are_rejected_whole() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    let (mut reefer, _pin) = reefer();
    let ssid_before = store.ssid().to_owned();

    let long = "k".repeat(100);
    let res = reefer.handle_command(
        ReeferCommand::SetCredentials {
            ssid: "brewhouse",
            passphrase: &long,
        },
        &mut store,
    );
    assert!(res.is_err());
    assert_eq!(store.ssid(), ssid_before);
}

// ── Status reporting ──────────────────────────────────────────

#[test]
fn status_reported_four_times_an_hour() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    let (mut reefer, _pin) = reefer();
    let mut sink = RecordingSink::new();
    reefer.start(secs(0), &mut sink);

    for t in 1..=3600u64 {
        reefer.update(62.0, secs(t), &mut store, &mut sink);
    }
    assert_eq!(sink.status_count(), 4);

    let last = sink
        .events
        .iter()
        .rev()
        .find_map(|e| match e {
            ReeferEvent::Status(r) => Some(*r),
            _ => None,
        })
        .unwrap();
    assert_eq!(last.state, StateId::Idle);
    assert_eq!(last.setpoint, 65.0);
    assert_eq!(last.temperature, 62.0);
    assert!(!last.pump_on);
}
