//! Pilsner reefer controller: firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────┐         ┌──────────────────────────────┐
//! │ core 0  ControlCore          │         │ core 1  SensorCore           │
//! │  ReeferController ─▶ pump    │         │  ThermistorProbe (ADC1)      │
//! │  PersistentStore  ─▶ flash   │         │  WifiAdapter (STA + SNTP)    │
//! │  CommandClient               │         │  serve_command               │
//! └──────────────┬───────────────┘         └───────────────┬──────────────┘
//!                │        SharedStateChannel (blackboard)   │
//!                └──────────────────┬───────────────────────┘
//!                          FlashLockout (park during erase)
//! ```
//!
//! Boot order: logger → record load (core 1 not running yet) → channel
//! initialise → core 1 spawned → control loop on core 0.
#![deny(unused_must_use)]

mod esp_link_shims;

use std::time::Duration;

use anyhow::{Result, bail};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use embedded_hal::digital::StatefulOutputPin;
use log::{error, info, warn};

use pilsner::adapters::flash::EspFlash;
use pilsner::adapters::log_sink::LogEventSink;
use pilsner::adapters::probe::ThermistorProbe;
use pilsner::adapters::time::MonotonicClock;
use pilsner::adapters::wifi::WifiAdapter;
use pilsner::app::ports::{EventSink, FlashPort};
use pilsner::app::reefer::ReeferController;
use pilsner::config::{LoopTiming, SystemConfig};
use pilsner::cores::CoreId;
use pilsner::cores::control::ControlCore;
use pilsner::cores::sensor::SensorCore;
use pilsner::drivers::pump::PumpRelay;
use pilsner::drivers::task_pin::spawn_on_core;
use pilsner::drivers::watchdog::Watchdog;
use pilsner::error::Error;
use pilsner::ipc::{CommandKind, FlashLockout, SharedStateChannel};
use pilsner::nvm::PersistentStore;
use pilsner::pins;

const SENSOR_TASK_PRIORITY: u8 = 5;
const SENSOR_TASK_STACK_KB: usize = 16;

/// Network settings copied out of the record before the store moves to core 0.
struct NetworkSettings {
    ssid: String,
    passphrase: String,
    timezone: String,
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Pilsner reefer v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = SystemConfig::default();
    config.validate()?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let channel = SharedStateChannel::new();
    let lockout = FlashLockout::new();

    // ── 2. Persistent record (core 1 is not running yet) ──────
    let flash = EspFlash::new().map_err(Error::from)?;
    let mut store = PersistentStore::new(
        flash,
        CoreId::Core0,
        &channel,
        &lockout,
        embassy_time::Duration::from_millis(u64::from(config.loops.lockout_timeout_ms)),
    );
    match store.load() {
        Ok(outcome) => info!("Record: {:?}", outcome),
        Err(e) => warn!("Record load failed ({}), running on defaults", e),
    }
    let net_settings = NetworkSettings {
        ssid: store.ssid().to_owned(),
        passphrase: store.passphrase().to_owned(),
        timezone: store.timezone().to_owned(),
    };

    // ── 3. Shared-state channel ───────────────────────────────
    if let Err(e) = channel.initialize() {
        error!("IPC channel init failed: {}", e);
        bail!("IPC channel init failed: {e}");
    }

    // ── 4. Reefer controller (pump relay on core 0) ───────────
    // SAFETY: the relay GPIO is claimed here only; nothing else takes it
    // from `peripherals.pins`.
    let relay_gpio = unsafe { AnyOutputPin::new(pins::PUMP_RELAY_GPIO) };
    let pin = PinDriver::output(relay_gpio)?;
    let pump = PumpRelay::new(pin).map_err(Error::from)?;
    let reefer = ReeferController::new(pump, config.reefer);
    let modem = peripherals.modem;
    let loops = config.loops;

    std::thread::scope(|s| -> Result<()> {
        // ── 5. Sensor core ────────────────────────────────────
        let (channel, lockout) = (&channel, &lockout);
        spawn_on_core(
            s,
            CoreId::Core1,
            SENSOR_TASK_PRIORITY,
            SENSOR_TASK_STACK_KB,
            "core1\0",
            move || run_sensor_core(modem, sysloop, nvs, net_settings, channel, lockout, loops),
        )?;

        // ── 6. Control loop ───────────────────────────────────
        let mut control = ControlCore::new(
            channel,
            store,
            reefer,
            LogEventSink::new(),
            loops.command_timeout_ticks,
        );
        run_control_core(&mut control, loops)
    })
}

fn run_control_core<F, P, S>(control: &mut ControlCore<'_, F, P, S>, loops: LoopTiming) -> Result<()>
where
    F: FlashPort,
    P: StatefulOutputPin,
    S: EventSink,
{
    let watchdog = Watchdog::subscribe("core0");
    let clock = MonotonicClock::new();
    let tick = Duration::from_millis(u64::from(loops.tick_ms));
    let mut asked_ip = false;
    let mut asked_clock = false;

    control.start(clock.now());
    info!("Core 0 ready. Entering control loop.");

    loop {
        control.tick(clock.now());

        // Report the address and wall clock once each becomes available.
        let w = control.working();
        let next = if w.wifi_connected && !asked_ip {
            Some(CommandKind::GetIp)
        } else if w.clock_ready && !asked_clock {
            Some(CommandKind::GetClockTime)
        } else {
            None
        };
        if let Some(kind) = next {
            if control.request(kind).is_ok() {
                match kind {
                    CommandKind::GetIp => asked_ip = true,
                    _ => asked_clock = true,
                }
            }
        }

        watchdog.feed();
        std::thread::sleep(tick);
    }
}

fn run_sensor_core(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    settings: NetworkSettings,
    channel: &SharedStateChannel,
    lockout: &FlashLockout,
    loops: LoopTiming,
) {
    let watchdog = Watchdog::subscribe("core1");

    let wifi = match EspWifi::new(modem, sysloop.clone(), Some(nvs))
        .and_then(|w| BlockingWifi::wrap(w, sysloop))
    {
        Ok(w) => w,
        Err(e) => {
            error!("WiFi driver init failed: {}; core 1 halted", e);
            return;
        }
    };
    let mut net = WifiAdapter::new(wifi);
    net.set_timezone(&settings.timezone);
    match net.set_credentials(&settings.ssid, &settings.passphrase) {
        Ok(()) => {
            if let Err(e) = net.connect() {
                warn!("WiFi: initial connect failed ({}), retrying in background", e);
            }
        }
        Err(e) => warn!("WiFi: stored credentials unusable ({}), staying offline", e),
    }

    let probe = match ThermistorProbe::new(pins::PROBE_ADC_CHANNEL) {
        Ok(p) => Some(p),
        Err(e) => {
            error!("Probe ADC init failed: {}; no temperature samples", e);
            None
        }
    };

    let mut core = SensorCore::new(channel, lockout, net, probe, loops.sample_every_ticks);
    if core.boot().is_err() {
        error!("Core 1 could not announce itself; control core will not see it");
    }

    let tick = Duration::from_millis(u64::from(loops.tick_ms));
    loop {
        core.tick();
        watchdog.feed();
        std::thread::sleep(tick);
    }
}
