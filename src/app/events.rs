//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to the web
//! UI, etc.

use crate::control::Amplitude;
use crate::error::{CommandError, SensorError};
use crate::fsm::StateId;

use super::commands::ControlSurface;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Auto-injection locked on target for the first time this session.
    TargetReached { current_ma: f32, amplitude: Amplitude },

    /// A countdown ran out and the stop path fired.
    CountdownExpired { from: StateId },

    /// A command was refused without changing state.
    CommandRejected {
        source: ControlSurface,
        error: CommandError,
    },

    /// The panel switch handed control to another surface.
    SurfaceChanged(ControlSurface),

    /// Meter poll failed; the previous reading is kept.
    SensorStale { error: SensorError, consecutive: u32 },

    /// Station link came up or went down.
    NetworkChanged { connected: bool },

    /// The application service has started (carries initial state).
    Started(StateId),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone)]
pub struct TelemetryData {
    pub state: StateId,
    pub voltage_v: f32,
    pub current_ma: f32,
    pub resistance_ohm: f32,
    pub amplitude: Amplitude,
    pub countdown_remaining_ms: Option<u64>,
    pub target_reached: bool,
    pub surface: ControlSurface,
    /// WiFi signal strength in dBm when connected.
    pub wifi_rssi: Option<i8>,
}
