//! WiFi adapter: soft AP for the control page plus an optional station
//! link for the cloud relay.
//!
//! Implements [`ConnectivityPort`] for the station side.  The soft AP is
//! configured once at construction and stays up whatever the station does.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF WiFi driver in mixed AP+STA mode
//!   via `esp_idf_svc::wifi`.
//! - **all other targets**: a scripted station for host-side tests.
//!
//! ## Association policy
//!
//! Nothing here blocks.  [`connect`](ConnectivityPort::connect) only
//! starts association; [`poll`](ConnectivityPort::poll) watches for the
//! link, gives up after the association timeout and retries after an
//! exponential backoff (min → 2·min → … capped at max).

use core::net::Ipv4Addr;

use log::{info, warn};

use crate::app::ports::{ConnectivityError, ConnectivityPort};
use crate::config::{is_printable_ascii, SystemConfig};

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    /// No association requested.
    Idle,
    Associating { since_ms: u64, attempt: u32 },
    Connected,
    /// Waiting to retry.
    Backoff { retry_at_ms: u64, attempt: u32 },
}

/// Station timing, taken from [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationPolicy {
    pub timeout_ms: u64,
    pub backoff_min_secs: u32,
    pub backoff_max_secs: u32,
}

impl AssociationPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            timeout_ms: u64::from(config.association_timeout_ms),
            backoff_min_secs: config.reconnect_backoff_min_secs,
            backoff_max_secs: config.reconnect_backoff_max_secs,
        }
    }
}

impl Default for AssociationPolicy {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(ConnectivityError::InvalidSsid);
    }
    if !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    policy: AssociationPolicy,
    backoff_secs: u32,
    last_rssi: Option<i8>,
    local_ip: Option<Ipv4Addr>,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimStation,
}

/// Host-side station. Associates on the first poll after a connect when
/// `reachable` is set.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimStation {
    reachable: bool,
    associating: bool,
    link_up: bool,
    connect_calls: u32,
}

impl WifiAdapter {
    /// Bring up the soft AP and leave the station idle.
    #[cfg(target_os = "espidf")]
    pub fn new(
        wifi: esp_idf_svc::wifi::EspWifi<'static>,
        policy: AssociationPolicy,
    ) -> Result<Self, ConnectivityError> {
        let mut adapter = Self {
            state: WifiState::Idle,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            policy,
            backoff_secs: policy.backoff_min_secs,
            last_rssi: None,
            local_ip: None,
            wifi,
        };
        adapter.apply_configuration()?;
        adapter
            .wifi
            .start()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        info!(
            "WiFi: soft AP '{}' up at {}",
            crate::config::AP_SSID,
            Ipv4Addr::from(crate::config::AP_ADDRESS)
        );
        Ok(adapter)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(policy: AssociationPolicy) -> Self {
        Self {
            state: WifiState::Idle,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            policy,
            backoff_secs: policy.backoff_min_secs,
            last_rssi: None,
            local_ip: None,
            sim: SimStation {
                reachable: true,
                ..SimStation::default()
            },
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    fn reset_backoff(&mut self) {
        self.backoff_secs = self.policy.backoff_min_secs;
    }

    /// Schedule the next attempt and grow the backoff.
    fn schedule_retry(&mut self, now_ms: u64, attempt: u32) {
        let wait = self.backoff_secs;
        self.state = WifiState::Backoff {
            retry_at_ms: now_ms + u64::from(wait) * 1_000,
            attempt,
        };
        self.backoff_secs = self
            .backoff_secs
            .saturating_mul(2)
            .min(self.policy.backoff_max_secs);
        info!("WiFi: retry {} in {}s", attempt + 1, wait);
    }

    fn start_attempt(&mut self, now_ms: u64, attempt: u32) -> Result<(), ConnectivityError> {
        info!("WiFi: associating with '{}' (attempt {})", self.ssid, attempt + 1);
        match self.platform_begin() {
            Ok(()) => {
                self.state = WifiState::Associating { since_ms: now_ms, attempt };
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: association not started: {}", e);
                self.schedule_retry(now_ms, attempt + 1);
                Err(e)
            }
        }
    }

    fn on_link_up(&mut self) {
        self.state = WifiState::Connected;
        self.reset_backoff();
        self.last_rssi = self.platform_rssi();
        self.local_ip = self.platform_ip();
        info!(
            "WiFi: connected to '{}' (RSSI={:?}, IP={:?})",
            self.ssid, self.last_rssi, self.local_ip
        );
    }

    fn on_link_down(&mut self) {
        self.last_rssi = None;
        self.local_ip = None;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn apply_configuration(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{
            AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration,
        };

        let client = ClientConfiguration {
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
        };
        let ap = AccessPointConfiguration {
            ssid: crate::config::AP_SSID
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: crate::config::AP_PASSWORD
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            max_connections: 4,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Mixed(client, ap))
            .map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        self.apply_configuration()?;
        // esp_wifi_connect only starts association; the link is picked up
        // by poll().
        self.wifi
            .connect()
            .map_err(|_| ConnectivityError::ConnectionFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        self.sim.connect_calls += 1;
        self.sim.associating = true;
        self.sim.link_up = false;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_abort(&mut self) {
        let _ = self.wifi.disconnect();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_abort(&mut self) {
        self.sim.associating = false;
        self.sim.link_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&mut self) -> bool {
        if self.sim.associating && self.sim.reachable {
            self.sim.associating = false;
            self.sim.link_up = true;
        }
        self.sim.link_up && self.sim.reachable
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: ap_info is a valid out-pointer; the call only fills it.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK as i32).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim.link_up.then_some(-58)
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
            .filter(|ip| !ip.is_unspecified())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        self.sim.link_up.then_some(Ipv4Addr::new(10, 0, 0, 42))
    }

    /// Host builds: make the upstream network (un)reachable.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
        if !reachable {
            self.sim.link_up = false;
        }
    }

    /// Host builds: association attempts made so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect_calls(&self) -> u32 {
        self.sim.connect_calls
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }
        self.reset_backoff();
        self.start_attempt(now_ms, 0)
    }

    fn disconnect(&mut self) {
        if self.state != WifiState::Idle {
            self.platform_abort();
            info!("WiFi: station disconnected");
        }
        self.state = WifiState::Idle;
        self.on_link_down();
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Idle => {}
            WifiState::Associating { since_ms, attempt } => {
                if self.platform_link_up() {
                    self.on_link_up();
                } else if now_ms.saturating_sub(since_ms) >= self.policy.timeout_ms {
                    warn!(
                        "WiFi: no link to '{}' after {}ms",
                        self.ssid, self.policy.timeout_ms
                    );
                    self.platform_abort();
                    self.schedule_retry(now_ms, attempt + 1);
                }
            }
            WifiState::Connected => {
                if self.platform_link_up() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost");
                    self.on_link_down();
                    self.reset_backoff();
                    self.schedule_retry(now_ms, 0);
                }
            }
            WifiState::Backoff { retry_at_ms, attempt } => {
                if now_ms >= retry_at_ms {
                    let _ = self.start_attempt(now_ms, attempt);
                }
            }
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    fn clear_credentials(&mut self) {
        self.disconnect();
        self.ssid.clear();
        self.password.clear();
        info!("WiFi: station credentials cleared");
    }

    fn ssid(&self) -> &str {
        &self.ssid
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.local_ip
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
