//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It contains the latest meter reading, the injector
//! amplitude, the active countdown, the auto-injection session and the
//! configuration.  Think of it as the "blackboard" in a blackboard
//! architecture.

use crate::config::SystemConfig;
use crate::control::{Amplitude, RegulatorStep, StepRegulator};
use crate::sensors::Measurement;
use crate::timing::Countdown;

// ---------------------------------------------------------------------------
// Auto-injection session
// ---------------------------------------------------------------------------

/// Bookkeeping for one auto-injection run. Exists only while the FSM is
/// in `Ramping`, `Holding` or `Recording`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionSession {
    /// Latched on first lock; survives later drift.
    pub target_reached: bool,
    /// Uptime of the last regulator evaluation.
    pub last_step_ms: Option<u64>,
    /// Length of the recording countdown once recording starts.
    pub record_window_ms: u64,
}

impl InjectionSession {
    pub fn new(record_window_ms: u64) -> Self {
        Self {
            target_reached: false,
            last_step_ms: None,
            record_window_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Uptime in milliseconds. Updated before each FSM tick.
    pub now_ms: u64,
    /// Uptime at which the current state was entered.
    pub state_since_ms: u64,

    // -- Sensor data --
    /// Latest meter reading. A failed poll leaves it unchanged.
    pub measurement: Measurement,

    // -- Actuator outputs --
    /// Injector drive level.
    pub amplitude: Amplitude,
    /// Set whenever `amplitude` is written; cleared once the DAC is updated.
    pub dac_dirty: bool,

    // -- Timers and sessions --
    pub countdown: Option<Countdown>,
    pub session: Option<InjectionSession>,
    /// Most recent regulator outcome, for telemetry.
    pub last_step: Option<RegulatorStep>,

    // -- Configuration --
    pub config: SystemConfig,
    pub regulator: StepRegulator,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            now_ms: 0,
            state_since_ms: 0,
            measurement: Measurement::default(),
            amplitude: Amplitude::ZERO,
            dac_dirty: true,
            countdown: None,
            session: None,
            last_step: None,
            regulator: StepRegulator::from_config(&config),
            config,
        }
    }

    /// Write the amplitude and mark the DAC for refresh.
    pub fn set_amplitude(&mut self, amplitude: Amplitude) {
        self.amplitude = amplitude;
        self.dac_dirty = true;
    }

    /// Milliseconds spent in the current state.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.state_since_ms)
    }

    pub fn target_reached(&self) -> bool {
        self.session.is_some_and(|s| s.target_reached)
    }

    pub fn countdown_expired(&self) -> bool {
        self.countdown.is_some_and(|c| c.is_expired(self.now_ms))
    }
}
