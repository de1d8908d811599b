//! Cooperative cross-core flash lockout.
//!
//! Program flash is executed in place, so while the owning core erases or
//! programs a sector the peer core must not fetch from it. The owner raises
//! a request; the peer notices it at the top of its loop, where it holds no
//! lock, and parks in a RAM-resident spin until the request drops.
//!
//! ```text
//!   owner (core 0)                      peer (core 1)
//!   ─────────────                       ─────────────
//!   wait !parked
//!   requested = true  ───────────────▶  service(): parked = true
//!   wait parked                         spin while requested
//!   erase / program
//!   drop guard: requested = false ───▶  parked = false, resume loop
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::{Duration, Instant};
use log::{debug, warn};

use crate::error::StoreError;

pub struct FlashLockout {
    requested: AtomicBool,
    parked: AtomicBool,
}

impl FlashLockout {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            parked: AtomicBool::new(false),
        }
    }

    /// Owner side: ask the peer to park and wait until it has.
    ///
    /// The peer only parks between loop phases, so `timeout` must cover its
    /// longest phase. On expiry no request is left behind.
    pub fn acquire(&self, timeout: Duration) -> Result<LockoutGuard<'_>, StoreError> {
        let deadline = Instant::now().checked_add(timeout).unwrap_or(Instant::MAX);

        // A previous park must fully unwind before a new request is raised,
        // otherwise a stale `parked` would be mistaken for an acknowledgement.
        if !spin_until(deadline, || !self.parked.load(Ordering::Acquire)) {
            warn!("lockout: peer still parked from a previous request");
            return Err(StoreError::LockoutTimeout);
        }

        self.requested.store(true, Ordering::Release);
        if !spin_until(deadline, || self.parked.load(Ordering::Acquire)) {
            self.requested.store(false, Ordering::Release);
            warn!("lockout: peer did not park within {}ms", timeout.as_millis());
            return Err(StoreError::LockoutTimeout);
        }

        debug!("lockout: peer parked");
        Ok(LockoutGuard { lockout: self })
    }

    /// Peer side: park here for as long as a lockout is requested.
    ///
    /// Must be called where the peer holds no lock. Returns `true` if the
    /// core was parked.
    #[inline]
    pub fn service(&self) -> bool {
        if !self.requested.load(Ordering::Acquire) {
            return false;
        }
        self.park();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::Acquire)
    }

    #[inline(never)]
    #[cfg_attr(target_os = "espidf", unsafe(link_section = ".iram1.lockout_park"))]
    fn park(&self) {
        self.parked.store(true, Ordering::Release);
        while self.requested.load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
        self.parked.store(false, Ordering::Release);
    }
}

impl Default for FlashLockout {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the owner for the duration of a flash mutation. Dropping it
/// releases the peer on every exit path.
pub struct LockoutGuard<'a> {
    lockout: &'a FlashLockout,
}

impl Drop for LockoutGuard<'_> {
    fn drop(&mut self) {
        self.lockout.requested.store(false, Ordering::Release);
        debug!("lockout: released");
    }
}

fn spin_until(deadline: Instant, mut done: impl FnMut() -> bool) -> bool {
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        core::hint::spin_loop();
    }
    done()
}
