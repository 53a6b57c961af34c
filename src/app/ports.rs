//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (meter, DAC, indicators, display, storage, WiFi, cloud)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** and **SettingsPort** implementations MUST validate
//!   before persisting.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::net::Ipv4Addr;

use crate::config::{BrokerSettings, NetworkSettings, SystemConfig};
use crate::error::SensorError;
use crate::fsm::{MenuSelection, StateId};
use crate::sensors::Measurement;

use super::commands::{Reply, Request};
use super::display::DisplayFrame;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain meter data.
pub trait SensorPort {
    /// One register-block read. Failures leave the caller's previous
    /// reading in place.
    fn read_measurement(&mut self) -> Result<Measurement, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// LED set and relay derived from the device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorState {
    pub runtime_led: bool,
    pub run_led: bool,
    pub stop_led: bool,
    /// Relay coil energised; the driver handles the active-low pin.
    pub relay_energized: bool,
}

impl IndicatorState {
    pub fn for_state(state: StateId) -> Self {
        let menu = state.menu();
        Self {
            runtime_led: menu == MenuSelection::Runtime,
            run_led: menu == MenuSelection::Run,
            stop_led: menu == MenuSelection::Stop,
            relay_energized: state.is_running(),
        }
    }
}

/// Write-side port: the domain calls this to command outputs.
pub trait ActuatorPort {
    /// Write one 8-bit level to the injector DAC.
    fn write_dac(&mut self, level: u8);

    /// Drive the menu LEDs and the output relay.
    fn set_indicators(&mut self, state: IndicatorState);
}

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → TFT)
// ───────────────────────────────────────────────────────────────

/// Renders a prepared [`DisplayFrame`]. Layout and fonts are the
/// adapter's business.
pub trait DisplayPort {
    fn render(&mut self, frame: &DisplayFrame);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges should be rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Loads and persists WiFi credentials and the cloud endpoint.
pub trait SettingsPort {
    /// Stored settings, or [`NetworkSettings::default()`] when none exist.
    fn load_settings(&self) -> Result<NetworkSettings, ConfigError>;

    /// Validate and persist.
    fn save_settings(&mut self, settings: &NetworkSettings) -> Result<(), ConfigError>;

    /// Stored broker settings, or [`BrokerSettings::default()`].
    fn load_broker(&self) -> Result<BrokerSettings, ConfigError>;

    fn save_broker(&mut self, broker: &BrokerSettings) -> Result<(), ConfigError>;

    /// Erase every stored key in the settings namespace.
    fn factory_reset(&mut self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ WiFi station)
// ───────────────────────────────────────────────────────────────

/// Station-side WiFi link. The soft AP for the captive portal is brought
/// up once at boot and is not managed through this port.
///
/// Association is non-blocking: [`connect`](Self::connect) only starts it
/// and [`poll`](Self::poll) advances it.
pub trait ConnectivityPort {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn poll(&mut self, now_ms: u64);
    /// Validate and stage station credentials. The running link picks them
    /// up on its next association attempt.
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    /// Drop the link and forget the station credentials.
    fn clear_credentials(&mut self);
    fn ssid(&self) -> &str;
    fn rssi(&self) -> Option<i8>;
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Cloud port (driven adapter: domain → HTTP relay)
// ───────────────────────────────────────────────────────────────

/// What the relay endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudResponse {
    pub status: u16,
    pub body: String,
}

impl CloudResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

pub trait CloudPort {
    /// POST a JSON body. Any HTTP status is a response; only transport
    /// failures are errors.
    fn post_json(&mut self, url: &str, body: &str) -> Result<CloudResponse, CloudError>;
}

// ───────────────────────────────────────────────────────────────
// Command port (driving adapter: web → control loop)
// ───────────────────────────────────────────────────────────────

/// Synchronous request/reply bridge into the control loop.
pub trait CommandPort {
    fn request(&self, request: Request) -> Result<Reply, BridgeError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] and [`SettingsPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from the blob store underneath the NVS adapter. A missing key
/// is not an error there; it reads as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudError {
    NotConnected,
    InvalidUrl,
    RequestFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// Command queue is full.
    QueueFull,
    /// Control loop did not answer in time.
    Timeout,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

impl core::fmt::Display for CloudError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "WiFi not connected"),
            Self::InvalidUrl => write!(f, "cloud URL invalid"),
            Self::RequestFailed => write!(f, "cloud request failed"),
        }
    }
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
            Self::Timeout => write!(f, "control loop timeout"),
        }
    }
}
