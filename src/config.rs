//! System configuration parameters
//!
//! All tunable parameters for the CORE Test injector.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Step sizes applied by the auto-injection regulator, selected by how far
/// the measured current is from the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepBands {
    /// Errors strictly above this (mA) use `coarse_step`.
    pub coarse_error_ma: f32,
    /// Errors strictly above this (mA) use `medium_step`.
    pub medium_error_ma: f32,
    pub coarse_step: f32,
    pub medium_step: f32,
    pub fine_step: f32,
}

impl Default for StepBands {
    fn default() -> Self {
        Self {
            coarse_error_ma: 50.0,
            medium_error_ma: 20.0,
            coarse_step: 0.01,
            medium_step: 0.005,
            fine_step: 0.001,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Regulation ---
    /// Auto-injection target current (mA)
    pub target_current_ma: f32,
    /// Lock window around the target (± mA)
    pub tolerance_ma: f32,
    /// Regulator step bands
    pub step_bands: StepBands,
    /// Amplitude change per encoder detent (fraction of full scale)
    pub encoder_step: f32,

    // --- Countdown ---
    /// Countdown armed by the RUNTIME menu entry (ms)
    pub runtime_countdown_ms: u32,
    /// Recording window after the target is reached (ms)
    pub record_countdown_ms: u32,
    /// Recording window for special-mode injections when none is given (s)
    pub special_countdown_secs: u32,

    // --- Power meter ---
    /// Modbus unit id of the JSY1050
    pub meter_unit_id: u8,
    /// First holding register of the measurement block
    pub meter_start_register: u16,
    /// Number of holding registers to read
    pub meter_register_count: u16,
    /// Per-request response timeout (ms)
    pub meter_timeout_ms: u32,

    // --- Inputs ---
    /// Debounce window for buttons and the mode switch (ms)
    pub debounce_ms: u32,

    // --- Network ---
    /// Station association timeout before falling back to AP-only (ms)
    pub association_timeout_ms: u32,
    /// First reconnect backoff (s)
    pub reconnect_backoff_min_secs: u32,
    /// Reconnect backoff ceiling (s)
    pub reconnect_backoff_max_secs: u32,

    // --- Timing ---
    /// Sensor read interval (milliseconds)
    pub sensor_read_interval_ms: u32,
    /// Regulator step interval (milliseconds)
    pub control_tick_ms: u32,
    /// Telemetry report interval (milliseconds)
    pub telemetry_interval_ms: u32,
    /// Local display refresh interval (milliseconds)
    pub display_refresh_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Regulation
            target_current_ma: 200.0,
            tolerance_ma: 5.0,
            step_bands: StepBands::default(),
            encoder_step: 0.01,

            // Countdown
            runtime_countdown_ms: 120_000, // 2 min
            record_countdown_ms: 120_000,  // 2 min
            special_countdown_secs: 15,

            // Power meter
            meter_unit_id: 1,
            meter_start_register: 0x0048,
            meter_register_count: 10,
            meter_timeout_ms: 200,

            // Inputs
            debounce_ms: 50,

            // Network
            association_timeout_ms: 20_000,
            reconnect_backoff_min_secs: 2,
            reconnect_backoff_max_secs: 60,

            // Timing
            sensor_read_interval_ms: 500, // 2 Hz
            control_tick_ms: 50,          // 20 Hz
            telemetry_interval_ms: 10_000,
            display_refresh_ms: 250,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10.0..=1000.0).contains(&self.target_current_ma) {
            return Err(ConfigError::ValidationFailed(
                "target_current_ma must be 10–1000",
            ));
        }
        if !(0.5..=50.0).contains(&self.tolerance_ma) {
            return Err(ConfigError::ValidationFailed("tolerance_ma must be 0.5–50"));
        }
        let b = &self.step_bands;
        if b.medium_error_ma <= self.tolerance_ma || b.coarse_error_ma <= b.medium_error_ma {
            return Err(ConfigError::ValidationFailed(
                "step bands must satisfy tolerance < medium < coarse",
            ));
        }
        let steps_ordered = 0.0 < b.fine_step && b.fine_step <= b.medium_step && b.medium_step <= b.coarse_step;
        if !steps_ordered || b.coarse_step > 0.1 {
            return Err(ConfigError::ValidationFailed(
                "step sizes must satisfy 0 < fine <= medium <= coarse <= 0.1",
            ));
        }
        if !(0.001..=0.1).contains(&self.encoder_step) {
            return Err(ConfigError::ValidationFailed("encoder_step must be 0.001–0.1"));
        }
        if !(1_000..=3_600_000).contains(&self.runtime_countdown_ms) {
            return Err(ConfigError::ValidationFailed(
                "runtime_countdown_ms must be 1000–3600000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.record_countdown_ms) {
            return Err(ConfigError::ValidationFailed(
                "record_countdown_ms must be 1000–3600000",
            ));
        }
        if !(1..=3600).contains(&self.special_countdown_secs) {
            return Err(ConfigError::ValidationFailed(
                "special_countdown_secs must be 1–3600",
            ));
        }
        if !(1..=247).contains(&self.meter_unit_id) {
            return Err(ConfigError::ValidationFailed("meter_unit_id must be 1–247"));
        }
        if !(2..=125).contains(&self.meter_register_count) {
            return Err(ConfigError::ValidationFailed(
                "meter_register_count must be 2–125",
            ));
        }
        if !(20..=2000).contains(&self.meter_timeout_ms) {
            return Err(ConfigError::ValidationFailed("meter_timeout_ms must be 20–2000"));
        }
        if !(5..=500).contains(&self.debounce_ms) {
            return Err(ConfigError::ValidationFailed("debounce_ms must be 5–500"));
        }
        if !(1_000..=120_000).contains(&self.association_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "association_timeout_ms must be 1000–120000",
            ));
        }
        if self.reconnect_backoff_min_secs == 0
            || self.reconnect_backoff_max_secs < self.reconnect_backoff_min_secs
        {
            return Err(ConfigError::ValidationFailed(
                "reconnect backoff must satisfy 0 < min <= max",
            ));
        }
        if !(10..=1000).contains(&self.control_tick_ms) {
            return Err(ConfigError::ValidationFailed("control_tick_ms must be 10–1000"));
        }
        if !(100..=10_000).contains(&self.sensor_read_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sensor_read_interval_ms must be 100–10000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.telemetry_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be 1000–3600000",
            ));
        }
        if !(50..=5_000).contains(&self.display_refresh_ms) {
            return Err(ConfigError::ValidationFailed(
                "display_refresh_ms must be 50–5000",
            ));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Network settings
// ───────────────────────────────────────────────────────────────

/// Soft AP the captive portal is served from.
pub const AP_SSID: &str = "CORE Test";
pub const AP_PASSWORD: &str = "12345678";
pub const AP_ADDRESS: [u8; 4] = [192, 168, 4, 1];

pub const DEFAULT_CLOUD_URL: &str = "https://api.example.com/submit-data";

/// Station credentials and the cloud relay endpoint. An empty SSID
/// leaves the station interface idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    pub cloud_url: heapless::String<128>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let mut cloud_url = heapless::String::new();
        let _ = cloud_url.push_str(DEFAULT_CLOUD_URL);
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            cloud_url,
        }
    }
}

/// Every byte in `0x20..=0x7E`. Empty strings pass.
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl NetworkSettings {
    /// Build from borrowed strings, rejecting anything that does not fit.
    pub fn new(ssid: &str, password: &str, cloud_url: &str) -> Result<Self, ConfigError> {
        let mut s = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            cloud_url: heapless::String::new(),
        };
        s.ssid
            .push_str(ssid)
            .map_err(|_| ConfigError::ValidationFailed("SSID longer than 32 bytes"))?;
        s.password
            .push_str(password)
            .map_err(|_| ConfigError::ValidationFailed("password longer than 64 bytes"))?;
        s.cloud_url
            .push_str(cloud_url)
            .map_err(|_| ConfigError::ValidationFailed("cloud URL longer than 128 bytes"))?;
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_printable_ascii(&self.ssid) {
            return Err(ConfigError::ValidationFailed("SSID must be printable ASCII"));
        }
        if !self.password.is_empty() && self.password.len() < 8 {
            return Err(ConfigError::ValidationFailed(
                "password must be empty or 8-64 bytes",
            ));
        }
        let url = self.cloud_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(
                "cloud URL must start with http:// or https://",
            ));
        }
        Ok(())
    }

    pub fn has_station(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Message broker settings
// ───────────────────────────────────────────────────────────────

pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Publish target for an external MQTT broker. Stored next to the
/// network settings and cleared with them; no client consumes it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub host: heapless::String<64>,
    pub port: u16,
    pub user: heapless::String<32>,
    pub password: heapless::String<64>,
    pub client_id: heapless::String<32>,
    pub topic: heapless::String<64>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: fixed("vps.domain.com"),
            port: DEFAULT_BROKER_PORT,
            user: fixed("esp1"),
            password: fixed("password"),
            client_id: fixed("esp32_01"),
            topic: fixed("sensor/esp32"),
        }
    }
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    let _ = out.push_str(s);
    out
}

fn bounded<const N: usize>(s: &str, what: &'static str) -> Result<heapless::String<N>, ConfigError> {
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|_| ConfigError::ValidationFailed(what))?;
    Ok(out)
}

impl BrokerSettings {
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        client_id: &str,
        topic: &str,
    ) -> Result<Self, ConfigError> {
        let s = Self {
            host: bounded(host, "MQTT host longer than 64 bytes")?,
            port,
            user: bounded(user, "MQTT user longer than 32 bytes")?,
            password: bounded(password, "MQTT password longer than 64 bytes")?,
            client_id: bounded(client_id, "MQTT client id longer than 32 bytes")?,
            topic: bounded(topic, "MQTT topic longer than 64 bytes")?,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::ValidationFailed("MQTT host is required"));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed("MQTT port must be 1-65535"));
        }
        let fields = [
            self.host.as_str(),
            self.user.as_str(),
            self.password.as_str(),
            self.client_id.as_str(),
            self.topic.as_str(),
        ];
        if !fields.into_iter().all(is_printable_ascii) {
            return Err(ConfigError::ValidationFailed(
                "MQTT settings must be printable ASCII",
            ));
        }
        Ok(())
    }
}
