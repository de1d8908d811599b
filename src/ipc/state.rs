//! The blackboard record mirrored by both cores, plus its dirty-mask.
//!
//! Each field group has exactly one writer core:
//!
//! | Group            | Writer        | Mask bit         |
//! |------------------|---------------|------------------|
//! | readiness flags  | sensor core   | `CORE1_READY`, `WIFI_CONNECTED`, `CLOCK_READY` |
//! | clock time       | sensor core   | `CLOCK_TIME`     |
//! | IP / MAC / scan  | sensor core   | `IP_ADDR`, `MAC_ADDR`, `SCAN_DATA` |
//! | temperature      | sensor core   | `TEMPERATURE`    |
//! | command + seq    | control core  | `COMMAND`        |
//! | ack + seq        | sensor core   | `ACK`            |
//!
//! The control core is allowed one write into the ack group: clearing it
//! back to `NoCommand` after it has consumed a response.

use core::ops::{BitOr, BitOrAssign};

use heapless::{String, Vec};

/// Maximum number of access points kept from one scan.
pub const MAX_SCAN_RESULTS: usize = 16;

pub type ScanList = Vec<AccessPoint, MAX_SCAN_RESULTS>;

// ---------------------------------------------------------------------------
// Command codes
// ---------------------------------------------------------------------------

/// Request codes for the single-slot remote call. Values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CommandKind {
    #[default]
    NoCommand = 0,
    GetClockTime = 1,
    GetIp = 2,
    GetMac = 3,
    DoScan = 4,
}

impl CommandKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::NoCommand => "NoCommand",
            Self::GetClockTime => "GetClockTime",
            Self::GetIp => "GetIP",
            Self::GetMac => "GetMAC",
            Self::DoScan => "DoScan",
        }
    }
}

// ---------------------------------------------------------------------------
// Dirty mask
// ---------------------------------------------------------------------------

/// Bitset naming the field groups a caller wants merged into the canonical
/// state. One bit maps to exactly one field group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateMask(u16);

impl UpdateMask {
    pub const NONE: Self = Self(0);
    pub const CORE1_READY: Self = Self(0x001);
    pub const WIFI_CONNECTED: Self = Self(0x002);
    pub const CLOCK_READY: Self = Self(0x004);
    pub const CLOCK_TIME: Self = Self(0x008);
    pub const IP_ADDR: Self = Self(0x010);
    pub const MAC_ADDR: Self = Self(0x020);
    pub const SCAN_DATA: Self = Self(0x040);
    /// Temperature and its sample counter.
    pub const TEMPERATURE: Self = Self(0x080);
    /// Command and its sequence number.
    pub const COMMAND: Self = Self(0x100);
    /// Ack and the echoed sequence number.
    pub const ACK: Self = Self(0x200);

    /// Every field group.
    pub const ALL: Self = Self(0x3FF);

    /// Not a field group: reset `command` to `NoCommand`, but only while it
    /// still carries the caller's `command_seq`.
    pub const COMMAND_DONE: Self = Self(0x400);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UpdateMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for UpdateMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Network snapshot types
// ---------------------------------------------------------------------------

/// One row of a Wi-Fi scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccessPoint {
    pub ssid: String<32>,
    /// Colon-separated hex, e.g. `a4:2b:b0:11:22:33`.
    pub bssid: String<18>,
    pub rssi_dbm: i8,
    pub channel: u8,
    pub encryption: String<16>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SharedState {
    pub core1_ready: bool,
    pub wifi_connected: bool,
    pub clock_ready: bool,
    /// Unix seconds reported by the clock-sync collaborator.
    pub clock_time: Option<u64>,

    pub temperature: f32,
    /// Bumped on every new sample; readers compare it to detect fresh data.
    pub temp_sample_count: u32,

    pub ip_address: String<16>,
    pub mac_address: String<18>,
    pub scan_result: ScanList,

    pub command: CommandKind,
    pub command_seq: u16,
    pub ack: CommandKind,
    pub ack_seq: u16,
}

impl SharedState {
    /// All-zero state with both command slots at `NoCommand`.
    pub const fn new() -> Self {
        Self {
            core1_ready: false,
            wifi_connected: false,
            clock_ready: false,
            clock_time: None,
            temperature: 0.0,
            temp_sample_count: 0,
            ip_address: String::new(),
            mac_address: String::new(),
            scan_result: Vec::new(),
            command: CommandKind::NoCommand,
            command_seq: 0,
            ack: CommandKind::NoCommand,
            ack_seq: 0,
        }
    }

    /// Copy every field group flagged in `mask` from `src` into `self`.
    pub fn merge_from(&mut self, mask: UpdateMask, src: &Self) {
        if mask.contains(UpdateMask::CORE1_READY) {
            self.core1_ready = src.core1_ready;
        }
        if mask.contains(UpdateMask::WIFI_CONNECTED) {
            self.wifi_connected = src.wifi_connected;
        }
        if mask.contains(UpdateMask::CLOCK_READY) {
            self.clock_ready = src.clock_ready;
        }
        if mask.contains(UpdateMask::CLOCK_TIME) {
            self.clock_time = src.clock_time;
        }
        if mask.contains(UpdateMask::IP_ADDR) {
            self.ip_address.clone_from(&src.ip_address);
        }
        if mask.contains(UpdateMask::MAC_ADDR) {
            self.mac_address.clone_from(&src.mac_address);
        }
        if mask.contains(UpdateMask::SCAN_DATA) {
            self.scan_result.clone_from(&src.scan_result);
        }
        if mask.contains(UpdateMask::TEMPERATURE) {
            self.temperature = src.temperature;
            self.temp_sample_count = src.temp_sample_count;
        }
        if mask.contains(UpdateMask::COMMAND) {
            self.command = src.command;
            self.command_seq = src.command_seq;
        }
        if mask.contains(UpdateMask::COMMAND_DONE) && self.command_seq == src.command_seq {
            self.command = CommandKind::NoCommand;
        }
        if mask.contains(UpdateMask::ACK) {
            self.ack = src.ack;
            self.ack_seq = src.ack_seq;
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
