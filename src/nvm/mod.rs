//! Flash-backed persistent configuration and runtime statistics.
//!
//! The record lives in the last erase sector of the program flash. Because
//! the second core executes in place from that same flash, a write is a
//! short stop-the-world window:
//!
//! ```text
//!   persist()  [owner core only]
//!     ├─ peer ready? ── acquire FlashLockout (peer parks in RAM)
//!     ├─ critical section
//!     │    ├─ erase sector
//!     │    └─ program page by page
//!     └─ drop guard (peer resumes)
//! ```
//!
//! Mutators only change the RAM copy. RAM and flash deliberately diverge
//! until the next [`PersistentStore::persist`].

pub mod record;

use embassy_time::Duration;
use log::{error, info, warn};

use crate::app::ports::FlashPort;
use crate::cores::{CoreId, current_core};
use crate::error::{FlashError, StoreError};
use crate::ipc::{FlashLockout, SharedStateChannel};
use record::{PersistentRecord, RECORD_IMAGE_LEN};

/// What [`PersistentStore::load`] found in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid record was read.
    Loaded,
    /// The sector held no valid record; defaults were written back.
    Restored,
}

pub struct PersistentStore<'a, F: FlashPort> {
    flash: F,
    record: PersistentRecord,
    owner: CoreId,
    channel: &'a SharedStateChannel,
    lockout: &'a FlashLockout,
    lockout_timeout: Duration,
    persist_count: u32,
    runtime_unsaved: bool,
}

impl<'a, F: FlashPort> PersistentStore<'a, F> {
    /// A store holding defaults in RAM; call [`load`](Self::load) before use.
    pub fn new(
        flash: F,
        owner: CoreId,
        channel: &'a SharedStateChannel,
        lockout: &'a FlashLockout,
        lockout_timeout: Duration,
    ) -> Self {
        Self {
            flash,
            record: PersistentRecord::defaults(),
            owner,
            channel,
            lockout,
            lockout_timeout,
            persist_count: 0,
            runtime_unsaved: false,
        }
    }

    /// Byte offset of the record sector: one sector below end of flash.
    pub fn record_offset(&self) -> u32 {
        self.flash.capacity() - self.flash.sector_size()
    }

    /// Read the record from flash. An invalid record is replaced by the
    /// defaults, which are persisted immediately.
    pub fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let mut image = [0u8; RECORD_IMAGE_LEN];
        let offset = self.record_offset();
        self.flash.read(offset, &mut image)?;

        if let Some(record) = PersistentRecord::decode(&image) {
            self.record = record;
            info!(
                "nvm: loaded record (setpoint={:.1} hyst={:.1} runtime={}s)",
                self.record.setpoint, self.record.hysteresis, self.record.accumulated_runtime_secs
            );
            return Ok(LoadOutcome::Loaded);
        }

        warn!("nvm: no valid record at {:#08x}, restoring defaults", offset);
        self.reset_to_defaults();
        self.persist()?;
        Ok(LoadOutcome::Restored)
    }

    /// Replace the RAM copy with compiled-in defaults. Flash is untouched.
    pub fn reset_to_defaults(&mut self) {
        self.record = PersistentRecord::defaults();
        self.runtime_unsaved = false;
    }

    /// Write the RAM copy to flash.
    ///
    /// Only the owning core may call this; any other caller is refused
    /// before flash or the record is touched. If the peer core is running
    /// it is parked for the duration of the erase/program.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let caller = current_core();
        if caller != self.owner {
            error!("nvm: persist refused on {:?} (owner {:?})", caller, self.owner);
            return Err(StoreError::NotOwner { caller });
        }

        let image = self.record.encode()?;
        let offset = self.record_offset();
        let page = self.flash.page_size() as usize;

        let lockout = self.lockout;
        let _guard = if self.channel.core1_ready() {
            Some(lockout.acquire(self.lockout_timeout)?)
        } else {
            None
        };

        let flash = &mut self.flash;
        critical_section::with(|_| -> Result<(), FlashError> {
            flash.erase_sector(offset)?;
            for (i, chunk) in image.chunks(page).enumerate() {
                flash.program_page(offset + (i * page) as u32, chunk)?;
            }
            Ok(())
        })?;

        self.persist_count = self.persist_count.wrapping_add(1);
        self.runtime_unsaved = false;
        info!("nvm: persisted {} bytes at {:#08x}", image.len(), offset);
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn record(&self) -> &PersistentRecord {
        &self.record
    }

    pub fn setpoint(&self) -> f32 {
        self.record.setpoint
    }

    pub fn hysteresis(&self) -> f32 {
        self.record.hysteresis
    }

    pub fn ssid(&self) -> &str {
        &self.record.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.record.passphrase
    }

    pub fn timezone(&self) -> &str {
        &self.record.timezone
    }

    pub fn accumulated_runtime_secs(&self) -> u32 {
        self.record.accumulated_runtime_secs
    }

    /// Runtime was folded in since the last successful persist.
    pub fn has_unsaved_runtime(&self) -> bool {
        self.runtime_unsaved
    }

    /// Successful persists since construction.
    pub fn persist_count(&self) -> u32 {
        self.persist_count
    }

    pub fn owner(&self) -> CoreId {
        self.owner
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_flash(self) -> F {
        self.flash
    }

    // ── RAM-only mutators ─────────────────────────────────────

    pub fn set_setpoint(&mut self, value: f32) -> Result<(), StoreError> {
        record::validate_setpoint(value)?;
        self.record.setpoint = value;
        Ok(())
    }

    pub fn set_hysteresis(&mut self, value: f32) -> Result<(), StoreError> {
        record::validate_hysteresis(value)?;
        self.record.hysteresis = value;
        Ok(())
    }

    /// Both strings are checked before either is stored.
    pub fn set_credentials(&mut self, ssid: &str, passphrase: &str) -> Result<(), StoreError> {
        let ssid = record::bounded(ssid, "ssid too long")?;
        let passphrase = record::bounded(passphrase, "passphrase too long")?;
        self.record.ssid = ssid;
        self.record.passphrase = passphrase;
        Ok(())
    }

    pub fn set_timezone(&mut self, tz: &str) -> Result<(), StoreError> {
        self.record.timezone = record::bounded(tz, "timezone too long")?;
        Ok(())
    }

    /// Fold a completed run into the lifetime counter (saturating).
    pub fn accumulate_runtime(&mut self, seconds: u32) {
        self.record.accumulated_runtime_secs =
            self.record.accumulated_runtime_secs.saturating_add(seconds);
        self.runtime_unsaved = true;
    }
}
