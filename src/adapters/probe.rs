//! NTC thermistor probe (10 kOhm @ 25 C, B = 3950) in the fermenter well.
//!
//! Wired in a voltage divider with a fixed 10 kOhm resistor and read via
//! the ESP32-S3 ADC1 oneshot API. The simplified Beta (Steinhart-Hart)
//! equation converts resistance to temperature, reported in degrees
//! Fahrenheit to match the setpoint.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: owns an ADC1 oneshot unit and reads one channel.
//! On host/test: reads an injectable raw value.

use log::warn;

use crate::app::ports::ProbePort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
/// Readings this close to either rail mean an open or shorted probe.
const RAIL_MARGIN_V: f32 = 0.01;

pub struct ThermistorProbe {
    #[cfg(target_os = "espidf")]
    unit: adc_oneshot_unit_handle_t,
    #[cfg(target_os = "espidf")]
    channel: adc_channel_t,
    #[cfg(not(target_os = "espidf"))]
    sim_raw: u16,
    faulted: bool,
}

impl ThermistorProbe {
    /// Claim ADC1 and configure `channel` for 12-bit, 12 dB reads.
    #[cfg(target_os = "espidf")]
    pub fn new(channel: u32) -> Result<Self, EspError> {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        let mut unit: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        // SAFETY: `unit` is a valid out-pointer for the duration of the call.
        esp!(unsafe { adc_oneshot_new_unit(&init_cfg, &mut unit) })?;

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        // SAFETY: `unit` was just created and is exclusively owned here.
        esp!(unsafe { adc_oneshot_config_channel(unit, channel, &chan_cfg) })?;
        log::info!("probe: ADC1 channel {} configured", channel);

        Ok(Self {
            unit,
            channel,
            faulted: false,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(_channel: u32) -> Self {
        Self {
            sim_raw: 2048,
            faulted: false,
        }
    }

    /// Simulation: set the raw ADC count the next read returns.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_raw(&mut self, raw: u16) {
        self.sim_raw = raw;
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&mut self) -> Option<u16> {
        let mut raw: i32 = 0;
        // SAFETY: `unit` is owned by this probe and only used from this core.
        let ret = unsafe { adc_oneshot_read(self.unit, self.channel, &mut raw) };
        (ret == ESP_OK as i32).then(|| raw.clamp(0, ADC_MAX as i32) as u16)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&mut self) -> Option<u16> {
        Some(self.sim_raw)
    }
}

#[cfg(target_os = "espidf")]
impl Drop for ThermistorProbe {
    fn drop(&mut self) {
        // SAFETY: the handle is not used after this point.
        unsafe {
            adc_oneshot_del_unit(self.unit);
        }
    }
}

impl ProbePort for ThermistorProbe {
    fn read_temperature(&mut self) -> Option<f32> {
        let reading = self.read_adc().and_then(adc_to_fahrenheit);
        match (reading, self.faulted) {
            (None, false) => {
                warn!("probe: no valid reading (open or shorted thermistor?)");
                self.faulted = true;
            }
            (Some(_), true) => {
                log::info!("probe: readings restored");
                self.faulted = false;
            }
            _ => {}
        }
        reading
    }
}

/// Convert a raw 12-bit ADC count to degrees Fahrenheit. `None` when the
/// divider voltage sits on a rail.
pub fn adc_to_fahrenheit(raw: u16) -> Option<f32> {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= RAIL_MARGIN_V || voltage >= V_REF - RAIL_MARGIN_V {
        return None;
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return None;
    }
    let celsius = (1.0 / inv_t) - 273.15;
    Some(celsius * 9.0 / 5.0 + 32.0)
}
