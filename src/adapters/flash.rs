//! On-chip program flash adapters.
//!
//! - [`EspFlash`] (`target_os = "espidf"`): the default SPI flash chip via
//!   `esp_flash_*`. The chip is shared with instruction fetch, so callers
//!   must hold the cross-core lockout while erasing or programming.
//! - [`MemFlash`] (all targets): an in-memory NOR model for host tests.
//!   Erase sets bytes to `0xFF`, programming ANDs bits in, and every erase
//!   and program is counted. Corruption and power loss can be injected.

use crate::app::ports::FlashPort;
use crate::error::FlashError;

const SECTOR_SIZE: u32 = 4096;
const PAGE_SIZE: u32 = 256;

fn check_range(capacity: u32, offset: u32, len: usize) -> Result<(), FlashError> {
    let end = u64::from(offset) + len as u64;
    if end > u64::from(capacity) {
        return Err(FlashError::OutOfBounds);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// In-memory NOR model
// ───────────────────────────────────────────────────────────────

/// Where an injected power loss strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLoss {
    /// The next erase clears only the first half of the sector.
    DuringErase,
    /// The next page program writes only half of its bytes.
    DuringProgram,
}

#[derive(Debug)]
pub struct MemFlash {
    storage: Vec<u8>,
    erase_counts: Vec<u32>,
    programs: u32,
    power_loss: Option<PowerLoss>,
    fail_erase: bool,
}

impl MemFlash {
    /// A fully erased device of `capacity` bytes (whole sectors).
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity - capacity % SECTOR_SIZE;
        Self {
            storage: vec![0xFF; capacity as usize],
            erase_counts: vec![0; (capacity / SECTOR_SIZE) as usize],
            programs: 0,
            power_loss: None,
            fail_erase: false,
        }
    }

    /// 2 MiB, the size of the controller's flash part.
    pub fn two_mib() -> Self {
        Self::new(2 * 1024 * 1024)
    }

    pub fn contents(&self, offset: u32, len: usize) -> &[u8] {
        &self.storage[offset as usize..offset as usize + len]
    }

    /// Overwrite bytes directly, bypassing NOR semantics.
    pub fn inject_corruption(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.storage[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn simulate_power_loss(&mut self, at: PowerLoss) {
        self.power_loss = Some(at);
    }

    /// Make every subsequent erase report a driver failure.
    pub fn fail_erases(&mut self, fail: bool) {
        self.fail_erase = fail;
    }

    pub fn erase_count(&self, offset: u32) -> u32 {
        self.erase_counts[(offset / SECTOR_SIZE) as usize]
    }

    pub fn total_erases(&self) -> u32 {
        self.erase_counts.iter().sum()
    }

    pub fn total_programs(&self) -> u32 {
        self.programs
    }

    /// Erases plus page programs.
    pub fn mutation_count(&self) -> u32 {
        self.total_erases() + self.programs
    }
}

impl FlashPort for MemFlash {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        check_range(self.capacity(), offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.storage[start..start + buf.len()]);
        Ok(())
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        if offset % SECTOR_SIZE != 0 {
            return Err(FlashError::Misaligned);
        }
        check_range(self.capacity(), offset, SECTOR_SIZE as usize)?;
        if self.fail_erase {
            return Err(FlashError::EraseFailed(-1));
        }

        let mut len = SECTOR_SIZE as usize;
        if self.power_loss == Some(PowerLoss::DuringErase) {
            self.power_loss = None;
            len /= 2;
        }
        let start = offset as usize;
        self.storage[start..start + len].fill(0xFF);
        self.erase_counts[(offset / SECTOR_SIZE) as usize] += 1;
        Ok(())
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        if offset % PAGE_SIZE != 0 || data.len() > PAGE_SIZE as usize {
            return Err(FlashError::Misaligned);
        }
        check_range(self.capacity(), offset, data.len())?;

        let mut len = data.len();
        if self.power_loss == Some(PowerLoss::DuringProgram) {
            self.power_loss = None;
            len /= 2;
        }
        let start = offset as usize;
        for (cell, byte) in self.storage[start..start + len].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.programs += 1;
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.storage.len() as u32
    }

    fn sector_size(&self) -> u32 {
        SECTOR_SIZE
    }

    fn page_size(&self) -> u32 {
        PAGE_SIZE
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF default flash chip
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspFlash {
    capacity: u32,
}

#[cfg(target_os = "espidf")]
impl EspFlash {
    pub fn new() -> Result<Self, FlashError> {
        use esp_idf_svc::sys::{ESP_OK, esp_flash_get_size};

        let mut size: u32 = 0;
        // SAFETY: a null chip pointer selects the default (boot) flash chip.
        let rc = unsafe { esp_flash_get_size(core::ptr::null_mut(), &mut size) };
        if rc != ESP_OK as i32 {
            return Err(FlashError::ReadFailed(rc));
        }
        log::info!("flash: default chip {} KiB", size / 1024);
        Ok(Self { capacity: size })
    }
}

#[cfg(target_os = "espidf")]
impl FlashPort for EspFlash {
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        check_range(self.capacity, offset, buf.len())?;
        // SAFETY: `buf` is valid for `buf.len()` bytes of writes.
        let rc = unsafe {
            esp_idf_svc::sys::esp_flash_read(
                core::ptr::null_mut(),
                buf.as_mut_ptr().cast(),
                offset,
                buf.len() as u32,
            )
        };
        if rc != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(FlashError::ReadFailed(rc));
        }
        Ok(())
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        if offset % SECTOR_SIZE != 0 {
            return Err(FlashError::Misaligned);
        }
        check_range(self.capacity, offset, SECTOR_SIZE as usize)?;
        // SAFETY: range validated above; default chip.
        let rc = unsafe {
            esp_idf_svc::sys::esp_flash_erase_region(core::ptr::null_mut(), offset, SECTOR_SIZE)
        };
        if rc != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(FlashError::EraseFailed(rc));
        }
        Ok(())
    }

    fn program_page(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        if offset % PAGE_SIZE != 0 || data.len() > PAGE_SIZE as usize {
            return Err(FlashError::Misaligned);
        }
        check_range(self.capacity, offset, data.len())?;
        // SAFETY: `data` is valid for `data.len()` bytes of reads.
        let rc = unsafe {
            esp_idf_svc::sys::esp_flash_write(
                core::ptr::null_mut(),
                data.as_ptr().cast(),
                offset,
                data.len() as u32,
            )
        };
        if rc != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(FlashError::ProgramFailed(rc));
        }
        Ok(())
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }
}
