//! WiFi station adapter with SNTP clock sync.
//!
//! Implements [`NetworkPort`] for the sensor core. Every call here may
//! block (connect, scan), so only core 1 ever owns a `WifiAdapter`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` station
//!   plus `EspSntp` once the link is up.
//! - **all other targets**: deterministic simulation for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying from [`NetworkPort::poll`].

use core::fmt::{self, Write as _};
use std::time::{Duration, Instant};

use heapless::String;
use log::{error, info, warn};

use crate::app::ports::NetworkPort;
use crate::ipc::state::ScanList;

#[cfg(target_os = "espidf")]
use crate::ipc::AccessPoint;
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    sntp::{EspSntp, SyncStatus},
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    AuthFailed,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-63 bytes for WPA2, or empty for open)"),
            Self::AuthFailed => write!(f, "access point rejected the passphrase"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

const MIN_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 63 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: String<32>,
    password: String<64>,
    timezone: String<32>,
    backoff_secs: u64,
    next_attempt: Option<Instant>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
    /// Simulation: counts platform_connect() calls for deterministic failures.
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_clock: Option<u64>,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: String::new(),
            password: String::new(),
            timezone: String::new(),
            backoff_secs: MIN_BACKOFF_SECS,
            next_attempt: None,
            wifi,
            sntp: None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: String::new(),
            password: String::new(),
            timezone: String::new(),
            backoff_secs: MIN_BACKOFF_SECS,
            next_attempt: None,
            sim_connect_counter: 0,
            sim_link_up: false,
            sim_clock: None,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// POSIX TZ string used for local time once the clock is synced.
    pub fn set_timezone(&mut self, tz: &str) {
        self.timezone.clear();
        if self.timezone.push_str(tz).is_err() {
            warn!("WiFi: timezone '{}' too long, keeping UTC", tz);
            return;
        }
        self.platform_set_timezone();
    }

    pub fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(0);
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.next_attempt = None;
        info!("WiFi: disconnected");
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_secs = MIN_BACKOFF_SECS;
        self.next_attempt = None;
        self.platform_start_sntp();
        info!("WiFi: connected");
    }

    fn schedule_retry(&mut self, attempt: u32) {
        self.state = WifiState::Reconnecting { attempt };
        self.next_attempt = Some(Instant::now() + Duration::from_secs(self.backoff_secs));
        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let cfg = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        self.wifi
            .set_configuration(&cfg)
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi
                .start()
                .map_err(|_| ConnectivityError::ConnectionFailed)?;
        }
        self.wifi
            .connect()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        self.wifi
            .wait_netif_up()
            .map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        // Every 10th attempt fails to exercise the reconnect path.
        if self.sim_connect_counter % 10 == 3 {
            warn!("WiFi(sim): simulated auth failure (attempt {})", self.sim_connect_counter);
            return Err(ConnectivityError::AuthFailed);
        }
        self.sim_link_up = true;
        info!("WiFi(sim): connected to '{}' (attempt {})", self.ssid, self.sim_connect_counter);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi: disconnect failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_sntp(&mut self) {
        if self.sntp.is_some() {
            return;
        }
        match EspSntp::new_default() {
            Ok(sntp) => {
                info!("SNTP: started");
                self.sntp = Some(sntp);
            }
            Err(e) => warn!("SNTP: start failed: {}", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_sntp(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_set_timezone(&mut self) {
        // SAFETY: only the sensor core touches the environment, and it does
        // so before any local-time conversion runs.
        unsafe { std::env::set_var("TZ", self.timezone.as_str()) };
        info!("WiFi: timezone {}", self.timezone);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_timezone(&mut self) {
        info!("WiFi(sim): timezone {}", self.timezone);
    }

    /// Simulation: drop the link as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_EPOCH: u64 = 1_700_000_000;

impl NetworkPort for WifiAdapter {
    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    fn poll(&mut self) {
        match self.state {
            WifiState::Reconnecting { attempt } => {
                if self.next_attempt.is_some_and(|t| Instant::now() < t) {
                    return;
                }
                info!("WiFi: reconnect attempt {}", attempt + 1);
                match self.platform_connect() {
                    Ok(()) => self.on_connected(),
                    Err(_) => self.schedule_retry(attempt + 1),
                }
            }
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.schedule_retry(0);
                    return;
                }
                #[cfg(not(target_os = "espidf"))]
                {
                    let t = self.sim_clock.map_or(SIM_EPOCH, |t| t + 1);
                    self.sim_clock = Some(t);
                }
            }
            WifiState::Disconnected => {}
        }
    }

    #[cfg(target_os = "espidf")]
    fn ip_address(&self) -> Option<String<16>> {
        let info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        let mut out = String::new();
        write!(out, "{}", info.ip).ok()?;
        Some(out)
    }

    #[cfg(not(target_os = "espidf"))]
    fn ip_address(&self) -> Option<String<16>> {
        if !self.is_connected() {
            return None;
        }
        String::try_from("192.168.4.23").ok()
    }

    #[cfg(target_os = "espidf")]
    fn mac_address(&self) -> String<18> {
        let mac = self.wifi.wifi().sta_netif().get_mac().unwrap_or([0; 6]);
        format_mac(&mac)
    }

    #[cfg(not(target_os = "espidf"))]
    fn mac_address(&self) -> String<18> {
        format_mac(&[0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56])
    }

    #[cfg(target_os = "espidf")]
    fn scan(&mut self, out: &mut ScanList) {
        let found = match self.wifi.scan() {
            Ok(found) => found,
            Err(e) => {
                warn!("WiFi: scan failed: {}", e);
                return;
            }
        };
        for ap in found.iter().take(out.capacity()) {
            let mut entry = AccessPoint {
                ssid: String::try_from(ap.ssid.as_str()).unwrap_or_default(),
                bssid: format_mac(&ap.bssid),
                rssi_dbm: ap.signal_strength,
                channel: ap.channel,
                encryption: String::new(),
            };
            match &ap.auth_method {
                Some(m) => {
                    let _ = write!(entry.encryption, "{:?}", m);
                }
                None => {
                    let _ = entry.encryption.push_str("unknown");
                }
            }
            let _ = out.push(entry);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn scan(&mut self, out: &mut ScanList) {
        use crate::ipc::AccessPoint;

        let sim = [
            ("brewhouse", [0xa4, 0x2b, 0xb0, 0x01, 0x02, 0x03], -48, 6, "WPA2Personal"),
            ("garage", [0xa4, 0x2b, 0xb0, 0x0a, 0x0b, 0x0c], -71, 11, "WPA2Personal"),
            ("guest", [0x3c, 0x84, 0x6a, 0x10, 0x20, 0x30], -80, 1, "None"),
        ];
        for (ssid, bssid, rssi, channel, enc) in sim {
            let _ = out.push(AccessPoint {
                ssid: String::try_from(ssid).unwrap_or_default(),
                bssid: format_mac(&bssid),
                rssi_dbm: rssi,
                channel,
                encryption: String::try_from(enc).unwrap_or_default(),
            });
        }
    }

    #[cfg(target_os = "espidf")]
    fn clock_time(&self) -> Option<u64> {
        let synced = self
            .sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == SyncStatus::Completed);
        if !synced {
            return None;
        }
        super::time::unix_time()
    }

    #[cfg(not(target_os = "espidf"))]
    fn clock_time(&self) -> Option<u64> {
        self.sim_clock
    }
}

fn format_mac(mac: &[u8; 6]) -> String<18> {
    let mut out = String::new();
    let _ = write!(
        out,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    out
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
