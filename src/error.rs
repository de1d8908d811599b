//! Unified error types for the Pilsner firmware.
//!
//! Every subsystem has a small `Copy` error enum, and all of them convert
//! into the top-level [`Error`] so the core loops can log failures
//! uniformly without allocation.

use core::fmt;

use crate::cores::CoreId;
use crate::ipc::CommandKind;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The cross-core shared-state channel rejected an operation.
    Channel(ChannelError),
    /// The persistent record store failed.
    Store(StoreError),
    /// The raw flash driver failed.
    Flash(FlashError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A remote command could not be issued.
    Command(CommandError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Channel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// `exchange` was called before `initialize`.
    Uninitialized,
    /// `initialize` was called a second time while the channel was live.
    AlreadyInitialized,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "channel not initialised"),
            Self::AlreadyInitialized => write!(f, "channel already initialised"),
        }
    }
}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Flash driver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Address range falls outside the device.
    OutOfBounds,
    /// Erase or program not aligned to the sector / page size.
    Misaligned,
    ReadFailed(i32),
    EraseFailed(i32),
    ProgramFailed(i32),
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::Misaligned => write!(f, "misaligned access"),
            Self::ReadFailed(rc) => write!(f, "read failed (rc={rc})"),
            Self::EraseFailed(rc) => write!(f, "erase failed (rc={rc})"),
            Self::ProgramFailed(rc) => write!(f, "program failed (rc={rc})"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Persistent store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// `persist` was invoked from a core that does not own flash writes.
    NotOwner { caller: CoreId },
    /// The peer core never parked in its lockout loop.
    LockoutTimeout,
    /// The underlying flash driver failed.
    Flash(FlashError),
    /// The record does not fit its sector image.
    Encode,
    /// A mutator rejected its input; the record is unchanged.
    Invalid(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner { caller } => write!(f, "persist refused on {caller:?}"),
            Self::LockoutTimeout => write!(f, "peer core did not enter lockout"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Encode => write!(f, "record encode failed"),
            Self::Invalid(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl From<FlashError> for StoreError {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// A request is still outstanding in the single command slot.
    Busy(CommandKind),
    /// `NoCommand` is not a request.
    Empty,
    /// The channel refused the exchange.
    Channel(ChannelError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(kind) => write!(f, "{} still outstanding", kind.label()),
            Self::Empty => write!(f, "no command given"),
            Self::Channel(e) => write!(f, "{e}"),
        }
    }
}

impl From<ChannelError> for CommandError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
