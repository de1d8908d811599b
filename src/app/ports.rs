//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PersistentStore / ReeferController / core loops
//! ```
//!
//! Driven adapters (flash, probe, network, event sinks) implement these
//! traits. The domain consumes them via generics, so it never touches
//! hardware directly.

use crate::error::FlashError;
use crate::ipc::state::ScanList;

// ───────────────────────────────────────────────────────────────
// Flash port (driven adapter: domain ↔ on-chip program flash)
// ───────────────────────────────────────────────────────────────

/// Raw NOR flash access.
///
/// Erase sets a whole sector to `0xFF`; programming can only clear bits,
/// so a page must be erased before it is programmed.
pub trait FlashPort {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Erase the sector starting at `offset` (sector-aligned).
    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError>;

    /// Program one page starting at `offset` (page-aligned, at most one page).
    fn program_page(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Total device size in bytes.
    fn capacity(&self) -> u32;

    fn sector_size(&self) -> u32 {
        4096
    }

    fn page_size(&self) -> u32 {
        256
    }
}

impl<T: FlashPort + ?Sized> FlashPort for &mut T {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(offset, buf)
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        (**self).erase_sector(offset)
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).program_page(offset, data)
    }

    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn sector_size(&self) -> u32 {
        (**self).sector_size()
    }

    fn page_size(&self) -> u32 {
        (**self).page_size()
    }
}

// ───────────────────────────────────────────────────────────────
// Probe port (driven adapter: hardware → sensor core)
// ───────────────────────────────────────────────────────────────

/// Temperature probe collaborator. `None` when no valid sample is available.
pub trait ProbePort {
    fn read_temperature(&mut self) -> Option<f32>;
}

/// A probe that failed to initialise never produces a sample.
impl<P: ProbePort> ProbePort for Option<P> {
    fn read_temperature(&mut self) -> Option<f32> {
        self.as_mut()?.read_temperature()
    }
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: network stack → sensor core)
// ───────────────────────────────────────────────────────────────

/// Wi-Fi station and clock-sync collaborator.
///
/// Calls may block for seconds (scan, reconnect); they are only ever
/// made from the sensor core.
pub trait NetworkPort {
    fn is_connected(&self) -> bool;

    /// Drive reconnection and clock sync. Called once per network phase.
    fn poll(&mut self);

    fn ip_address(&self) -> Option<heapless::String<16>>;

    fn mac_address(&self) -> heapless::String<18>;

    /// Blocking scan; fills `out` with as many access points as fit.
    fn scan(&mut self, out: &mut ScanList);

    /// Unix seconds once the clock has been synchronised.
    fn clock_time(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`ReeferEvent`](super::events::ReeferEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ReeferEvent);
}
