//! Unified error types for the CORE Test firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the top-level control loop's error handling uniform. All variants are
//! `Copy` so they can be passed through the service and command replies
//! without allocation.

use core::fmt;

use crate::app::ports::{CloudError, ConfigError, ConnectivityError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The power meter could not be read or returned malformed data.
    Sensor(SensorError),
    /// A command was refused by the application core.
    Command(CommandError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Writing the request frame to the serial link failed.
    WriteFailed,
    /// Reading from the serial link failed.
    ReadFailed,
    /// No complete response arrived before the timeout.
    Timeout,
    /// The frame could not be built or parsed (CRC, unit id, function code).
    InvalidFrame,
    /// The response carried fewer registers than requested.
    ShortResponse,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "serial write failed"),
            Self::ReadFailed => write!(f, "serial read failed"),
            Self::Timeout => write!(f, "meter response timeout"),
            Self::InvalidFrame => write!(f, "invalid Modbus frame"),
            Self::ShortResponse => write!(f, "short register block"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Reasons the application core refuses a command. None of these change
/// device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Inject requested while a session is already running.
    AlreadyInjecting,
    /// Record requested before the target was reached, or while a
    /// recording countdown is already running.
    CannotRecord,
    /// Manual amplitude change while the regulator owns the amplitude.
    InjectionInProgress,
    /// Encoder adjustment while the output is not running.
    NotRunning,
    /// The command came from the surface that is not in control.
    SurfaceDisabled,
    /// A parameter was out of range or malformed.
    InvalidParameter(&'static str),
    /// The persistent store refused the write.
    StorageFailed,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInjecting => write!(f, "Already injecting"),
            Self::CannotRecord => write!(f, "Cannot start recording"),
            Self::InjectionInProgress => write!(f, "Auto-injection in progress"),
            Self::NotRunning => write!(f, "Output not running"),
            Self::SurfaceDisabled => write!(f, "Control surface disabled"),
            Self::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            Self::StorageFailed => write!(f, "Settings could not be saved"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    HttpServerFailed,
    CloudRequestFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::HttpServerFailed => write!(f, "HTTP server failed"),
            Self::CloudRequestFailed => write!(f, "cloud request failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(_: ConnectivityError) -> Self {
        Self::Comms(CommsError::WifiConnectFailed)
    }
}

impl From<CloudError> for Error {
    fn from(_: CloudError) -> Self {
        Self::Comms(CommsError::CloudRequestFailed)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
