//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the FSM and its shared context, the active control
//! surface and the poll intervals.  It exposes a clean, hardware-agnostic
//! API.  All I/O flows through port traits injected at call sites, making
//! the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │        AppService        │
//! ActuatorPort ◀──│ FSM · Regulator · Arbiter│
//!                 └──────────────────────────┘
//! ```
//!
//! One control-loop pass is: drain queued commands → [`AppService::tick`]
//! (regulator step, countdown expiry, outputs, meter poll, telemetry).

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::control::Amplitude;
use crate::error::CommandError;
use crate::fsm::context::{FsmContext, InjectionSession};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, MenuSelection, StateId};
use crate::sensors::Measurement;
use crate::timing::Interval;

use super::commands::{
    Ack, AppCommand, AutoInjectionAction, ControlSurface, NetworkCommand, Outcome, Reply,
};
use super::events::{AppEvent, TelemetryData};
use super::network::NetworkSupervisor;
use super::ports::{
    ActuatorPort, ConfigError, ConfigPort, ConnectivityPort, EventSink, IndicatorState,
    SensorPort, SettingsPort,
};
use super::status::{CountdownView, NetworkStatus, StatusSnapshot};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    surface: ControlSurface,
    network: NetworkStatus,
    sensor_interval: Interval,
    telemetry_interval: Interval,
    stale_reads: u32,
    /// Last indicator set written, so unchanged outputs are not rewritten.
    applied_indicators: Option<IndicatorState>,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let sensor_interval = Interval::new(config.sensor_read_interval_ms);
        let telemetry_interval = Interval::new(config.telemetry_interval_ms);
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Stopped),
            ctx: FsmContext::new(config),
            surface: ControlSurface::Local,
            network: NetworkStatus::default(),
            sensor_interval,
            telemetry_interval,
            stale_reads: 0,
            applied_indicators: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Stored configuration, or defaults when none can be used. A stored
    /// blob that no longer decodes or validates is overwritten with the
    /// defaults.
    pub fn load_config(store: &impl ConfigPort) -> SystemConfig {
        match store.load() {
            Ok(cfg) => cfg,
            Err(e @ (ConfigError::Corrupted | ConfigError::ValidationFailed(_))) => {
                warn!("Stored config unusable ({}), restoring defaults", e);
                let cfg = SystemConfig::default();
                if let Err(e) = store.save(&cfg) {
                    warn!("Default config not saved: {}", e);
                }
                cfg
            }
            Err(e) => {
                warn!("Config load failed ({}), using defaults", e);
                SystemConfig::default()
            }
        }
    }

    /// Start the FSM in `Stopped` and push the initial outputs.
    pub fn start(
        &mut self,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        self.fsm.start(&mut self.ctx);
        self.apply_outputs(hw);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control pass: regulator and countdown → outputs → meter
    /// poll → telemetry.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;
        let prev = self.fsm.current_state();
        let was_reached = self.ctx.target_reached();

        // 1. Regulator step and countdown expiry (inside the state handlers)
        self.fsm.tick(&mut self.ctx);

        let now_state = self.fsm.current_state();
        if now_state != prev && now_state == StateId::Stopped {
            info!("Countdown expired in {:?}", prev);
            sink.emit(&AppEvent::CountdownExpired { from: prev });
        }
        self.report_transition(prev, was_reached, sink);

        // 2. DAC, LEDs and relay
        self.apply_outputs(hw);

        // 3. Meter poll
        if self.sensor_interval.due(now_ms) {
            self.poll_sensor(hw, sink);
        }

        // 4. Telemetry
        if self.telemetry_interval.due(now_ms) {
            sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one command from `source`. Rejected commands change nothing.
    pub fn handle_command(
        &mut self,
        source: ControlSurface,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Reply {
        self.ctx.now_ms = now_ms;
        if cmd != AppCommand::GetStatus {
            self.check_surface(source, sink)?;
            info!("CMD[{}]: {:?}", source.as_str(), cmd);
        }

        let prev = self.fsm.current_state();
        let was_reached = self.ctx.target_reached();

        match self.execute(cmd) {
            Ok(outcome) => {
                self.report_transition(prev, was_reached, sink);
                self.apply_outputs(hw);
                Ok(Ack {
                    outcome,
                    status: self.status(),
                })
            }
            Err(error) => {
                self.reject(source, error, sink);
                Err(error)
            }
        }
    }

    /// Apply one WiFi/settings command from `source`.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_network(
        &mut self,
        source: ControlSurface,
        cmd: NetworkCommand,
        now_ms: u64,
        supervisor: &mut NetworkSupervisor,
        wifi: &mut impl ConnectivityPort,
        store: &mut impl SettingsPort,
        sink: &mut impl EventSink,
    ) -> Reply {
        self.ctx.now_ms = now_ms;
        self.check_surface(source, sink)?;
        match supervisor.handle(cmd, now_ms, wifi, store) {
            Ok(outcome) => {
                self.set_network_status(supervisor.status(wifi), sink);
                Ok(Ack {
                    outcome,
                    status: self.status(),
                })
            }
            Err(error) => {
                self.reject(source, error, sink);
                Err(error)
            }
        }
    }

    /// Panel switch position changed.
    pub fn set_surface(&mut self, surface: ControlSurface, sink: &mut impl EventSink) {
        if surface == self.surface {
            return;
        }
        info!(
            "Control surface: {} -> {}",
            self.surface.as_str(),
            surface.as_str()
        );
        self.surface = surface;
        sink.emit(&AppEvent::SurfaceChanged(surface));
    }

    /// Latest station link state from the network supervisor.
    pub fn set_network_status(&mut self, status: NetworkStatus, sink: &mut impl EventSink) {
        if status.connected != self.network.connected {
            sink.emit(&AppEvent::NetworkChanged {
                connected: status.connected,
            });
        }
        self.network = status;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_ms: self.ctx.now_ms,
            state: self.fsm.current_state(),
            measurement: self.ctx.measurement,
            amplitude: self.ctx.amplitude,
            countdown: self
                .ctx
                .countdown
                .map(|c| CountdownView::at(&c, self.ctx.now_ms)),
            target_reached: self.ctx.target_reached(),
            surface: self.surface,
            network: self.network.clone(),
        }
    }

    /// Build a telemetry snapshot from the current context.
    pub fn build_telemetry(&self) -> TelemetryData {
        TelemetryData {
            state: self.fsm.current_state(),
            voltage_v: self.ctx.measurement.voltage_v,
            current_ma: self.ctx.measurement.current_ma(),
            resistance_ohm: self.ctx.measurement.resistance_ohm,
            amplitude: self.ctx.amplitude,
            countdown_remaining_ms: self
                .ctx
                .countdown
                .map(|c| c.remaining_ms(self.ctx.now_ms)),
            target_reached: self.ctx.target_reached(),
            surface: self.surface,
            wifi_rssi: self.network.rssi,
        }
    }

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn amplitude(&self) -> Amplitude {
        self.ctx.amplitude
    }

    pub fn measurement(&self) -> Measurement {
        self.ctx.measurement
    }

    pub fn surface(&self) -> ControlSurface {
        self.surface
    }

    pub fn target_reached(&self) -> bool {
        self.ctx.target_reached()
    }

    /// Consecutive failed meter polls.
    pub fn stale_reads(&self) -> u32 {
        self.stale_reads
    }

    // ── Internal ──────────────────────────────────────────────

    fn check_surface(
        &mut self,
        source: ControlSurface,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        if source == self.surface {
            return Ok(());
        }
        self.reject(source, CommandError::SurfaceDisabled, sink);
        Err(CommandError::SurfaceDisabled)
    }

    fn reject(&self, source: ControlSurface, error: CommandError, sink: &mut impl EventSink) {
        match source {
            ControlSurface::Local => debug!("CMD[local] rejected: {}", error),
            ControlSurface::Remote => warn!("CMD[remote] rejected: {}", error),
        }
        sink.emit(&AppEvent::CommandRejected { source, error });
    }

    fn execute(&mut self, cmd: AppCommand) -> Result<Outcome, CommandError> {
        let state = self.fsm.current_state();
        match cmd {
            AppCommand::CycleMenu => {
                self.select_menu(state.menu().previous());
                Ok(Outcome::Applied)
            }
            AppCommand::SelectMenu(menu) => {
                self.select_menu(menu);
                Ok(Outcome::Applied)
            }
            AppCommand::AdjustAmplitude(detents) => {
                if state.is_injecting() {
                    return Err(CommandError::InjectionInProgress);
                }
                if !state.is_running() {
                    return Err(CommandError::NotRunning);
                }
                let delta = f32::from(detents) * self.ctx.config.encoder_step;
                self.ctx.set_amplitude(self.ctx.amplitude.offset(delta));
                Ok(Outcome::Applied)
            }
            AppCommand::ZeroAmplitude => {
                if state.is_injecting() {
                    return Err(CommandError::InjectionInProgress);
                }
                self.ctx.set_amplitude(Amplitude::ZERO);
                Ok(Outcome::Applied)
            }
            AppCommand::SetAmplitudePercent(percent) => {
                if !percent.is_finite() {
                    return Err(CommandError::InvalidParameter("amplitude must be a number"));
                }
                if state.is_injecting() {
                    return Err(CommandError::InjectionInProgress);
                }
                self.ctx.set_amplitude(Amplitude::from_percent(percent));
                Ok(Outcome::Applied)
            }
            AppCommand::AutoInjection(AutoInjectionAction::Inject) => {
                if state.is_injecting() {
                    return Err(CommandError::AlreadyInjecting);
                }
                let window = u64::from(self.ctx.config.record_countdown_ms);
                self.ctx.session = Some(InjectionSession::new(window));
                self.enter(StateId::Ramping);
                Ok(Outcome::InjectionStarted {
                    target_ma: self.ctx.regulator.target_ma(),
                })
            }
            AppCommand::AutoInjection(AutoInjectionAction::Record) => {
                if state != StateId::Holding {
                    return Err(CommandError::CannotRecord);
                }
                self.enter(StateId::Recording);
                let duration_ms = self.ctx.countdown.map_or(0, |c| c.duration_ms());
                Ok(Outcome::RecordingStarted {
                    duration_secs: (duration_ms / 1000) as u32,
                })
            }
            AppCommand::AutoInjection(AutoInjectionAction::Stop) | AppCommand::Stop => {
                self.enter(StateId::Stopped);
                Ok(Outcome::Stopped)
            }
            AppCommand::QuickInject { percent } => {
                if !percent.is_finite() {
                    return Err(CommandError::InvalidParameter("amplitude must be a number"));
                }
                self.enter(StateId::Running);
                let amplitude = Amplitude::from_percent(percent);
                self.ctx.set_amplitude(amplitude);
                Ok(Outcome::QuickApplied {
                    percent: amplitude.percent(),
                })
            }
            AppCommand::SpecialInject { window_secs } => {
                let secs = window_secs.unwrap_or(self.ctx.config.special_countdown_secs);
                if !(1..=3600).contains(&secs) {
                    return Err(CommandError::InvalidParameter("duration must be 1-3600 s"));
                }
                // Re-arms unconditionally, replacing any running session.
                self.ctx.session = Some(InjectionSession::new(u64::from(secs) * 1000));
                self.enter(StateId::Ramping);
                Ok(Outcome::SpecialArmed {
                    window_secs: secs,
                    target_ma: self.ctx.regulator.target_ma(),
                })
            }
            AppCommand::GetStatus => Ok(Outcome::Snapshot),
        }
    }

    /// Execute a menu entry. Re-selecting the current entry re-runs its
    /// entry action, so RUNTIME restarts its countdown.
    fn select_menu(&mut self, menu: MenuSelection) {
        self.enter(menu.target_state());
    }

    fn enter(&mut self, target: StateId) {
        if self.fsm.current_state() == target {
            self.fsm.reenter(&mut self.ctx);
        } else {
            self.fsm.force_transition(target, &mut self.ctx);
        }
    }

    fn report_transition(&self, prev: StateId, was_reached: bool, sink: &mut impl EventSink) {
        if !was_reached && self.ctx.target_reached() {
            sink.emit(&AppEvent::TargetReached {
                current_ma: self.ctx.measurement.current_ma(),
                amplitude: self.ctx.amplitude,
            });
        }
        let now = self.fsm.current_state();
        if now != prev {
            sink.emit(&AppEvent::StateChanged {
                from: prev,
                to: now,
            });
        }
    }

    fn poll_sensor(&mut self, hw: &mut impl SensorPort, sink: &mut impl EventSink) {
        match hw.read_measurement() {
            Ok(m) => {
                if self.stale_reads > 0 {
                    info!("Meter recovered after {} failed reads", self.stale_reads);
                }
                self.stale_reads = 0;
                self.ctx.measurement = m;
            }
            Err(error) => {
                self.stale_reads = self.stale_reads.saturating_add(1);
                debug!("Meter read failed ({}), keeping last reading", error);
                sink.emit(&AppEvent::SensorStale {
                    error,
                    consecutive: self.stale_reads,
                });
            }
        }
    }

    /// Write the DAC if the amplitude changed and the LEDs/relay if the
    /// state projection changed.
    fn apply_outputs(&mut self, hw: &mut impl ActuatorPort) {
        if self.ctx.dac_dirty {
            hw.write_dac(self.ctx.amplitude.dac_level());
            self.ctx.dac_dirty = false;
        }
        let indicators = IndicatorState::for_state(self.fsm.current_state());
        if self.applied_indicators != Some(indicators) {
            hw.set_indicators(indicators);
            self.applied_indicators = Some(indicators);
        }
    }
}
