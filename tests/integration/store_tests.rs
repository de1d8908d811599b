//! Integration tests for the persistent record across simulated reboots.

use embassy_time::Duration;

use pilsner::adapters::flash::MemFlash;
use pilsner::cores::{CoreId, bind_current_thread};
use pilsner::error::StoreError;
use pilsner::ipc::{FlashLockout, SharedStateChannel};
use pilsner::nvm::record::{DEFAULT_HYSTERESIS, DEFAULT_SETPOINT, DEFAULT_TIMEZONE};
use pilsner::nvm::{LoadOutcome, PersistentStore};

const BUDGET: Duration = Duration::from_millis(50);

fn channel() -> SharedStateChannel {
    let ch = SharedStateChannel::new();
    ch.initialize().unwrap();
    ch
}

#[test]
fn first_boot_writes_defaults_second_boot_reads_them() {
    let ch = channel();
    let lk = FlashLockout::new();

    let mut first = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(first.load(), Ok(LoadOutcome::Restored));
    let offset = first.record_offset();
    let flash = first.into_flash();
    assert_eq!(flash.erase_count(offset), 1);
    assert_eq!(flash.total_erases(), 1, "only the record sector is erased");

    let mut second = PersistentStore::new(flash, CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(second.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(second.setpoint(), DEFAULT_SETPOINT);
    assert_eq!(second.hysteresis(), DEFAULT_HYSTERESIS);
    assert_eq!(second.timezone(), DEFAULT_TIMEZONE);
    assert_eq!(second.accumulated_runtime_secs(), 0);
    assert_eq!(second.persist_count(), 0, "a valid record is not rewritten");
}

#[test]
fn wiped_record_page_restores_defaults() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.set_setpoint(48.0).unwrap();
    store.accumulate_runtime(7_200);
    store.persist().unwrap();

    let offset = store.record_offset();
    let mut flash = store.into_flash();
    flash.inject_corruption(offset, &[0u8; 256]);

    let mut rebooted = PersistentStore::new(flash, CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(rebooted.load(), Ok(LoadOutcome::Restored));
    assert_eq!(rebooted.setpoint(), DEFAULT_SETPOINT);
    assert_eq!(rebooted.accumulated_runtime_secs(), 0);
}

#[test]
fn settings_survive_reboot() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.load().unwrap();
    store.set_setpoint(50.5).unwrap();
    store.set_hysteresis(2.0).unwrap();
    store.set_credentials("cellar-ap", "lagering-at-50").unwrap();
    store.accumulate_runtime(42);
    store.persist().unwrap();

    let mut rebooted = PersistentStore::new(store.into_flash(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(rebooted.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(rebooted.setpoint(), 50.5);
    assert_eq!(rebooted.hysteresis(), 2.0);
    assert_eq!(rebooted.ssid(), "cellar-ap");
    assert_eq!(rebooted.passphrase(), "lagering-at-50");
    assert_eq!(rebooted.accumulated_runtime_secs(), 42);
}

#[test]
fn persist_from_sensor_core_thread_is_refused() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.set_setpoint(45.0).unwrap();

    let result = std::thread::scope(|s| {
        s.spawn(|| {
            bind_current_thread(CoreId::Core1);
            store.persist()
        })
        .join()
        .unwrap()
    });

    assert_eq!(
        result,
        Err(StoreError::NotOwner {
            caller: CoreId::Core1
        })
    );
    assert_eq!(store.flash().mutation_count(), 0);
    assert_eq!(store.setpoint(), 45.0, "RAM copy is kept");

    // The owner can still write it afterwards.
    store.persist().unwrap();
    assert_eq!(store.persist_count(), 1);
}

#[test]
fn reset_then_save_round_trips_defaults() {
    let ch = channel();
    let lk = FlashLockout::new();
    let mut store = PersistentStore::new(MemFlash::two_mib(), CoreId::Core0, &ch, &lk, BUDGET);
    store.set_setpoint(33.0).unwrap();
    store.accumulate_runtime(999);
    store.persist().unwrap();

    store.reset_to_defaults();
    store.persist().unwrap();

    let mut rebooted = PersistentStore::new(store.into_flash(), CoreId::Core0, &ch, &lk, BUDGET);
    assert_eq!(rebooted.load(), Ok(LoadOutcome::Loaded));
    assert_eq!(rebooted.setpoint(), DEFAULT_SETPOINT);
    assert_eq!(rebooted.accumulated_runtime_secs(), 0);
}
