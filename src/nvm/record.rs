//! The persisted configuration / statistics record and its flash image.
//!
//! Layout (postcard, fields in declared order):
//!
//! ```text
//!   lead_signature   u32 LE (fixed width)
//!   setpoint         f32
//!   hysteresis       f32
//!   ssid             varint len + ≤63 bytes
//!   passphrase       varint len + ≤63 bytes
//!   timezone         varint len + ≤31 bytes
//!   runtime_secs     u32 LE (fixed width)
//!   trail_signature  u32 LE (fixed width)
//!   0xFF padding to RECORD_IMAGE_LEN
//! ```
//!
//! The two signatures bracket the payload; a torn erase or program leaves
//! at least one of them wrong.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const LEAD_SIGNATURE: u32 = 0xABAD_1DEA;
pub const TRAIL_SIGNATURE: u32 = 0x5EA1_ED0C;

/// Encoded image size; one flash page.
pub const RECORD_IMAGE_LEN: usize = 256;

pub const SSID_MAX: usize = 63;
pub const PASSPHRASE_MAX: usize = 63;
pub const TIMEZONE_MAX: usize = 31;

pub const DEFAULT_SETPOINT: f32 = 65.0;
pub const DEFAULT_HYSTERESIS: f32 = 1.0;
pub const DEFAULT_TIMEZONE: &str = "CST6CDT";

const SETPOINT_RANGE: core::ops::RangeInclusive<f32> = -40.0..=212.0;
const HYSTERESIS_MAX: f32 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentRecord {
    #[serde(with = "postcard::fixint::le")]
    pub lead_signature: u32,
    pub setpoint: f32,
    pub hysteresis: f32,
    pub ssid: String<SSID_MAX>,
    pub passphrase: String<PASSPHRASE_MAX>,
    pub timezone: String<TIMEZONE_MAX>,
    #[serde(with = "postcard::fixint::le")]
    pub accumulated_runtime_secs: u32,
    #[serde(with = "postcard::fixint::le")]
    pub trail_signature: u32,
}

impl PersistentRecord {
    /// Compiled-in defaults. Credentials come from `PILSNER_WIFI_SSID` /
    /// `PILSNER_WIFI_PASSPHRASE` at build time, empty when unset.
    pub fn defaults() -> Self {
        Self {
            lead_signature: LEAD_SIGNATURE,
            setpoint: DEFAULT_SETPOINT,
            hysteresis: DEFAULT_HYSTERESIS,
            ssid: truncated(option_env!("PILSNER_WIFI_SSID").unwrap_or("")),
            passphrase: truncated(option_env!("PILSNER_WIFI_PASSPHRASE").unwrap_or("")),
            timezone: truncated(DEFAULT_TIMEZONE),
            accumulated_runtime_secs: 0,
            trail_signature: TRAIL_SIGNATURE,
        }
    }

    pub fn signatures_match(&self) -> bool {
        self.lead_signature == LEAD_SIGNATURE && self.trail_signature == TRAIL_SIGNATURE
    }

    /// Serialise into a padded page image.
    pub fn encode(&self) -> Result<[u8; RECORD_IMAGE_LEN], StoreError> {
        let mut image = [0xFF; RECORD_IMAGE_LEN];
        postcard::to_slice(self, &mut image).map_err(|_| StoreError::Encode)?;
        Ok(image)
    }

    /// Parse an image read back from flash. `None` if it is not a valid
    /// record: bad signatures, undecodable payload, or out-of-range values.
    pub fn decode(image: &[u8]) -> Option<Self> {
        let lead = image.get(..4)?;
        if u32::from_le_bytes([lead[0], lead[1], lead[2], lead[3]]) != LEAD_SIGNATURE {
            return None;
        }
        let record: Self = postcard::from_bytes(image).ok()?;
        if !record.signatures_match() {
            return None;
        }
        validate_setpoint(record.setpoint).ok()?;
        validate_hysteresis(record.hysteresis).ok()?;
        Some(record)
    }
}

impl Default for PersistentRecord {
    fn default() -> Self {
        Self::defaults()
    }
}

pub fn validate_setpoint(value: f32) -> Result<(), StoreError> {
    if !value.is_finite() || !SETPOINT_RANGE.contains(&value) {
        return Err(StoreError::Invalid("setpoint out of range"));
    }
    Ok(())
}

pub fn validate_hysteresis(value: f32) -> Result<(), StoreError> {
    if !value.is_finite() || !(0.0..HYSTERESIS_MAX).contains(&value) {
        return Err(StoreError::Invalid("hysteresis out of range"));
    }
    Ok(())
}

/// Copy `s` into a bounded string, or reject it if it does not fit.
pub fn bounded<const N: usize>(s: &str, what: &'static str) -> Result<String<N>, StoreError> {
    String::try_from(s).map_err(|()| StoreError::Invalid(what))
}

/// Copy as many whole characters of `s` as fit.
fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
