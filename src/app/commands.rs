//! Inbound user commands to the reefer controller.
//!
//! These arrive from the UI side of the control core (remote, console)
//! and are interpreted by
//! [`ReeferController::handle_command`](super::reefer::ReeferController::handle_command).

/// Commands that change or save the persisted configuration.
///
/// All setters are RAM-only; `Save` makes them durable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReeferCommand<'a> {
    SetSetpoint(f32),
    SetHysteresis(f32),
    SetCredentials { ssid: &'a str, passphrase: &'a str },
    SetTimezone(&'a str),
    /// Persist the current record.
    Save,
    /// Restore compiled-in defaults and persist them.
    FactoryReset,
}
