//! GPIO / peripheral pin assignments for the reefer controller board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Reefer pump relay
// ---------------------------------------------------------------------------

/// Digital output driving the pump relay coil through a transistor.
/// HIGH = pump running. Owned by core 0 only.
pub const PUMP_RELAY_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// Temperature probe: Analog (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor: 10 kOhm @ 25 C, voltage divider to ADC.
/// ADC1 channel 8 is GPIO 9 on ESP32-S3. Owned by core 1 only.
pub const PROBE_ADC_CHANNEL: u32 = 8;
