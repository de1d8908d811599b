//! Core-pinned scoped thread spawning for ESP32-S3 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that the next thread created from the
//! calling thread becomes a FreeRTOS task pinned to a specific CPU core
//! with explicit priority and stack size. Threads are scoped so the core
//! loops can borrow the channel, lockout and store owned by `main`.
//!
//! `esp_pthread_set_cfg()` configures the *next* `pthread_create()` from
//! the calling thread, so the config→spawn pair must not be interleaved
//! with other thread creation on the same thread.

use std::io;
use std::thread::{Scope, ScopedJoinHandle};

use crate::cores::CoreId;

/// Spawn a scoped thread pinned to `core`.
///
/// `name` must be null-terminated (e.g. `"core1\0"`). On the host the
/// thread binds itself to the simulated `core` instead of being pinned.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core<'scope, 'env, F>(
    scope: &'scope Scope<'scope, 'env>,
    core: CoreId,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<ScopedJoinHandle<'scope, ()>>
where
    F: FnOnce() + Send + 'scope,
{
    // SAFETY: the config struct is fully initialised by the IDF default
    // constructor and `name` is a 'static null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = priority as i32;
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn_scoped(scope, f)
}

/// Simulation fallback: binds the thread to the simulated core, ignores
/// priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core<'scope, 'env, F>(
    scope: &'scope Scope<'scope, 'env>,
    core: CoreId,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<ScopedJoinHandle<'scope, ()>>
where
    F: FnOnce() + Send + 'scope,
{
    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' (sim {:?}, stack={}KB)",
        display_name,
        core,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb * 1024)
        .spawn_scoped(scope, move || {
            crate::cores::bind_current_thread(core);
            f();
        })
}
