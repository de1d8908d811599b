//! Refrigeration pump relay driver.
//!
//! A single digital output switching the reefer pump's relay. Generic over
//! any `embedded-hal` stateful output pin, so the ESP-IDF `PinDriver` and
//! the host test pins drive the same code.
//!
//! ## Ownership
//!
//! Only the reefer controller holds a `PumpRelay`; no other component may
//! drive the pin.

use embedded_hal::digital::StatefulOutputPin;

use crate::error::ActuatorError;

pub struct PumpRelay<P> {
    pin: P,
    on: bool,
}

impl<P: StatefulOutputPin> PumpRelay<P> {
    /// Take ownership of the pin and force the pump off.
    pub fn new(mut pin: P) -> Result<Self, ActuatorError> {
        pin.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        Ok(Self { pin, on: false })
    }

    /// Drive the relay. The cached state only changes once the pin write
    /// succeeded.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let res = if on { self.pin.set_high() } else { self.pin.set_low() };
        res.map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.on = on;
        Ok(())
    }

    /// Last successfully commanded state.
    pub fn is_on(&self) -> bool {
        self.on
    }
}
