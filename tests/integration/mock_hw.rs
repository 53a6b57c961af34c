//! Mock hardware and a host-side control loop for integration tests.
//!
//! Records every actuator call so tests can assert on the full output
//! history without touching real DAC/GPIO registers.  [`Bench`] wires the
//! mocks to an [`AppService`] and runs passes the way the firmware's main
//! loop does.

use std::cell::RefCell;
use std::rc::Rc;

use coretest::adapters::nvs::NvsAdapter;
use coretest::adapters::wifi::{AssociationPolicy, WifiAdapter};
use coretest::app::arbiter::CommandQueue;
use coretest::app::commands::{ControlSurface, Reply, Request};
use coretest::app::events::AppEvent;
use coretest::app::network::NetworkSupervisor;
use coretest::app::ports::{
    ActuatorPort, BridgeError, CommandPort, EventSink, IndicatorState, SensorPort,
};
use coretest::app::service::AppService;
use coretest::config::SystemConfig;
use coretest::error::SensorError;
use coretest::sensors::Measurement;

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    /// Next meter reading; `None` makes the poll time out.
    pub reading: Option<Measurement>,
    /// Resistive load: milliamps at full-scale DAC. Overrides `reading`.
    pub load_full_scale_ma: Option<f32>,
    pub dac: Vec<u8>,
    pub indicators: Vec<IndicatorState>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Meter reports `ma` milliamps at 24 V.
    pub fn set_current_ma(&mut self, ma: f32) {
        self.reading = Some(Measurement::new(24.0, ma / 1000.0));
    }

    /// Current follows the DAC output, `full_scale_ma` at code 255.
    pub fn attach_load(&mut self, full_scale_ma: f32) {
        self.load_full_scale_ma = Some(full_scale_ma);
    }

    pub fn last_dac(&self) -> Option<u8> {
        self.dac.last().copied()
    }

    pub fn relay_energized(&self) -> bool {
        self.indicators.last().is_some_and(|i| i.relay_energized)
    }
}

impl SensorPort for MockHardware {
    fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        if let Some(full_scale) = self.load_full_scale_ma {
            let level = f32::from(self.last_dac().unwrap_or(0));
            let ma = level / 255.0 * full_scale;
            return Ok(Measurement::new(24.0, ma / 1000.0));
        }
        self.reading.ok_or(SensorError::Timeout)
    }
}

impl ActuatorPort for MockHardware {
    fn write_dac(&mut self, level: u8) {
        self.dac.push(level);
    }

    fn set_indicators(&mut self, state: IndicatorState) {
        self.indicators.push(state);
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Bench: the control loop on the host ───────────────────────

pub struct Bench {
    pub app: AppService,
    pub hw: MockHardware,
    pub sink: RecordingSink,
    pub supervisor: NetworkSupervisor,
    pub wifi: WifiAdapter,
    pub store: NvsAdapter,
    pub now_ms: u64,
}

#[allow(dead_code)]
impl Bench {
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        let store = NvsAdapter::new().expect("sim NVS");
        let wifi = WifiAdapter::new(AssociationPolicy::from_config(&config));
        let supervisor = NetworkSupervisor::load(&store);
        let mut app = AppService::new(config);
        let mut hw = MockHardware::new();
        let mut sink = RecordingSink::default();
        app.start(0, &mut hw, &mut sink);
        Self {
            app,
            hw,
            sink,
            supervisor,
            wifi,
            store,
            now_ms: 0,
        }
    }

    /// Bench with the panel switch in the web position.
    pub fn remote() -> Self {
        let mut bench = Self::new();
        bench.app.set_surface(ControlSurface::Remote, &mut bench.sink);
        bench
    }

    /// Apply one request as the control loop would.
    pub fn execute(&mut self, source: ControlSurface, request: Request) -> Reply {
        match request {
            Request::Control(cmd) => {
                self.app
                    .handle_command(source, cmd, self.now_ms, &mut self.hw, &mut self.sink)
            }
            Request::Network(cmd) => self.app.handle_network(
                source,
                cmd,
                self.now_ms,
                &mut self.supervisor,
                &mut self.wifi,
                &mut self.store,
                &mut self.sink,
            ),
        }
    }

    /// Drain `queue`, answering every envelope.
    pub fn drain(&mut self, queue: &CommandQueue) -> usize {
        let mut handled = 0;
        while let Some(envelope) = queue.try_next() {
            let reply = self.execute(envelope.source, envelope.request);
            queue.respond(envelope.id, reply);
            handled += 1;
        }
        handled
    }

    /// One full pass at `now_ms`: commands, tick, network.
    pub fn pass(&mut self, queue: &CommandQueue, now_ms: u64) {
        self.now_ms = now_ms;
        self.drain(queue);
        self.tick_at(now_ms);
    }

    pub fn tick_at(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.app.tick(now_ms, &mut self.hw, &mut self.sink);
        let link = self.supervisor.poll(now_ms, &mut self.wifi);
        self.app.set_network_status(link, &mut self.sink);
    }

    /// Tick every `step_ms` until `done` holds or `limit_ms` is reached.
    /// Returns whether `done` held.
    pub fn run_while(&mut self, limit_ms: u64, step_ms: u64, done: impl Fn(&AppService) -> bool) -> bool {
        while self.now_ms < limit_ms {
            if done(&self.app) {
                return true;
            }
            self.tick_at(self.now_ms + step_ms);
        }
        done(&self.app)
    }

    /// Tick every `step_ms` from the current time up to `until_ms`.
    pub fn run_until(&mut self, until_ms: u64, step_ms: u64) {
        while self.now_ms < until_ms {
            let next = (self.now_ms + step_ms).min(until_ms);
            self.tick_at(next);
        }
    }
}

// ── Command ports for the web API ─────────────────────────────

/// Executes web requests synchronously against a shared [`Bench`] as the
/// remote surface.
#[derive(Clone)]
pub struct DirectPort(pub Rc<RefCell<Bench>>);

impl CommandPort for DirectPort {
    fn request(&self, request: Request) -> Result<Reply, BridgeError> {
        Ok(self.0.borrow_mut().execute(ControlSurface::Remote, request))
    }
}

/// A control loop that never answers.
pub struct DeadPort;

impl CommandPort for DeadPort {
    fn request(&self, _request: Request) -> Result<Reply, BridgeError> {
        Err(BridgeError::Timeout)
    }
}

/// Meter poll and regulator on the same 100 ms cadence so a simulated load
/// settles predictably.
#[allow(dead_code)]
pub fn lockstep_config() -> SystemConfig {
    SystemConfig {
        sensor_read_interval_ms: 100,
        control_tick_ms: 100,
        ..SystemConfig::default()
    }
}
