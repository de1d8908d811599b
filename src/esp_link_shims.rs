//! Link-time providers for `critical-section` and `embassy-time` on ESP-IDF.
//!
//! `critical_section::with` guards the cross-core channel and the flash
//! erase/program window in `nvm`, so it must exclude both cores. A single
//! process-wide mutex does that. Nesting on one thread is tracked per
//! thread and only the outermost level takes the mutex.

use core::cell::RefCell;
use core::task::Waker;
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

static SECTION: Mutex<()> = Mutex::new(());

#[derive(Default)]
struct Held {
    depth: u8,
    guard: Option<MutexGuard<'static, ()>>,
}

thread_local! {
    static HELD: RefCell<Held> = RefCell::new(Held::default());
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        if held.depth == 0 {
            // The mutex protects `()`; a poisoned lock still excludes.
            held.guard = Some(SECTION.lock().unwrap_or_else(PoisonError::into_inner));
        }
        held.depth = held.depth.saturating_add(1);
        held.depth
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    HELD.with(|held| {
        let mut held = held.borrow_mut();
        match held.depth {
            0 => {}
            1 => {
                held.depth = 0;
                held.guard = None;
            }
            n => held.depth = n - 1,
        }
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_now() -> u64 {
    // SAFETY: reads the free-running microsecond timer; no preconditions.
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

/// Wake `waker` at `at` microseconds from a short-lived helper thread.
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_schedule_wake(at: u64, waker: *mut core::ffi::c_void) {
    if waker.is_null() {
        return;
    }
    // SAFETY: embassy-time hands over a live `Waker` for the duration of
    // the call; it is cloned before returning.
    let waker = unsafe { (*(waker as *const Waker)).clone() };
    std::thread::spawn(move || {
        let remaining = at.saturating_sub(_embassy_time_now());
        if remaining > 0 {
            std::thread::sleep(Duration::from_micros(remaining));
        }
        waker.wake();
    });
}
