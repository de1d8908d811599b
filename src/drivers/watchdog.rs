//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if a core loop stalls
//! for more than 10 seconds. Each core loop subscribes its own task and
//! must call `feed()` at least once per loop iteration batch.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

const TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the calling task to the TWDT. `name` only labels the log line.
    pub fn subscribe(name: &str) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls; a null handle means "the calling task".
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK as i32 {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK as i32;
                if subscribed {
                    info!("Watchdog: {} subscribed ({}ms timeout)", name, TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: {} failed to subscribe ({})", name, ret);
                }
                Self { subscribed }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {} no-op ({}ms)", name, TIMEOUT_MS);
            Self {}
        }
    }

    /// Feed the watchdog for the calling task.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the calling task's own TWDT entry.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}
