//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (front panel,
//! web UI) that the [`AppService`](super::service::AppService) interprets
//! and acts upon.  Every command carries the [`ControlSurface`] it came
//! from so the service can enforce that only one surface is in control.

use crate::config::{BrokerSettings, NetworkSettings};
use crate::error::CommandError;
use crate::fsm::MenuSelection;

use super::status::StatusSnapshot;

/// Where a command originated, and which surface is currently in control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSurface {
    /// Front panel: menu button, encoder, encoder push.
    Local,
    /// Web UI over the captive portal.
    Remote,
}

impl ControlSurface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// `action` values accepted by the auto-injection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoInjectionAction {
    Inject,
    Record,
    Stop,
}

impl AutoInjectionAction {
    /// `start` is accepted as an alias for `inject`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inject" | "start" => Some(Self::Inject),
            "record" => Some(Self::Record),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Commands that drive the device state.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Menu button: step the menu back one entry and execute it.
    CycleMenu,

    /// Encoder rotation, in signed detents.
    AdjustAmplitude(i8),

    /// Encoder push-button.
    ZeroAmplitude,

    /// Execute a menu entry directly (`/set_amplitude?state=`).
    SelectMenu(MenuSelection),

    /// Set the amplitude from a 0–100 percentage.
    SetAmplitudePercent(f32),

    /// Drive the auto-injection controller.
    AutoInjection(AutoInjectionAction),

    /// Fixed amplitude, RUN without countdown, any session cancelled.
    QuickInject { percent: f32 },

    /// Auto-injection with a custom recording window (seconds).
    SpecialInject { window_secs: Option<u32> },

    /// Universal stop: amplitude zero, session and countdown dropped.
    Stop,

    /// Read-only status query.
    GetStatus,
}

/// Commands that touch WiFi and persisted settings.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkCommand {
    /// Persist new credentials and start re-association.
    Update(NetworkSettings),
    /// Persist the message broker target. The link is left alone.
    SetBroker(BrokerSettings),
    /// Erase persisted settings and fall back to defaults.
    Reset,
}

/// One queued unit of work for the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Control(AppCommand),
    Network(NetworkCommand),
}

impl From<AppCommand> for Request {
    fn from(cmd: AppCommand) -> Self {
        Self::Control(cmd)
    }
}

impl From<NetworkCommand> for Request {
    fn from(cmd: NetworkCommand) -> Self {
        Self::Network(cmd)
    }
}

/// What an accepted command did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// State or amplitude updated.
    Applied,
    /// Auto-injection started toward `target_ma`.
    InjectionStarted { target_ma: f32 },
    /// Special-mode injection armed with its recording window.
    SpecialArmed { window_secs: u32, target_ma: f32 },
    /// Quick mode set the amplitude.
    QuickApplied { percent: f32 },
    /// Recording countdown started.
    RecordingStarted { duration_secs: u32 },
    /// Output stopped and everything reset.
    Stopped,
    /// Status query answered.
    Snapshot,
    /// Network settings saved; association in progress.
    NetworkSaved,
    /// Network settings restored to defaults.
    NetworkReset,
    /// Broker settings stored.
    BrokerSaved,
}

/// Accepted command: what happened plus the resulting status.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub outcome: Outcome,
    pub status: StatusSnapshot,
}

/// Result of one command. Rejections never change device state.
pub type Reply = Result<Ack, CommandError>;
