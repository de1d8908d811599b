//! Cross-core shared-state channel.
//!
//! ```text
//!   core 0 working copy ──┐                  ┌── core 1 working copy
//!                         ▼                  ▼
//!                  exchange(mask, &mut working)
//!                         │  lock            │
//!                         │  merge dirty ──▶ canonical
//!                         │  canonical ──▶ working (all fields)
//!                         │  unlock          │
//! ```
//!
//! The channel is a blackboard, not a queue: every exchange returns a
//! complete, consistent snapshot, so a caller never sees a half-written
//! state and never polls individual fields.

pub mod command;
pub mod lockout;
pub mod state;

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;

use crate::error::ChannelError;

pub use command::{CommandClient, CommandOutcome, serve_command};
pub use lockout::{FlashLockout, LockoutGuard};
pub use state::{AccessPoint, CommandKind, SharedState, UpdateMask};

/// Mutex-guarded canonical [`SharedState`], shared by reference between the
/// two core loops.
pub struct SharedStateChannel {
    initialized: AtomicBool,
    state: Mutex<CriticalSectionRawMutex, RefCell<SharedState>>,
}

impl SharedStateChannel {
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            state: Mutex::new(RefCell::new(SharedState::new())),
        }
    }

    /// Zero the canonical state and open the channel.
    ///
    /// Must succeed before the second core is launched. A second call is
    /// refused so a live peer never sees its fields wiped.
    pub fn initialize(&self) -> Result<(), ChannelError> {
        if self.initialized.load(Ordering::Acquire) {
            return Err(ChannelError::AlreadyInitialized);
        }
        self.state.lock(|cell| *cell.borrow_mut() = SharedState::new());
        self.initialized.store(true, Ordering::Release);
        info!("ipc: shared-state channel initialised");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Merge the `dirty` field groups of `working` into the canonical state,
    /// then overwrite all of `working` with the canonical state.
    ///
    /// On an uninitialised channel `working` is left untouched.
    pub fn exchange(&self, dirty: UpdateMask, working: &mut SharedState) -> Result<(), ChannelError> {
        if !self.is_initialized() {
            return Err(ChannelError::Uninitialized);
        }
        self.state.lock(|cell| {
            let mut canonical = cell.borrow_mut();
            canonical.merge_from(dirty, working);
            working.clone_from(&canonical);
        });
        Ok(())
    }

    /// Whether the sensor core has announced itself. `false` before
    /// initialisation.
    pub fn core1_ready(&self) -> bool {
        self.is_initialized() && self.state.lock(|cell| cell.borrow().core1_ready)
    }
}

impl Default for SharedStateChannel {
    fn default() -> Self {
        Self::new()
    }
}
