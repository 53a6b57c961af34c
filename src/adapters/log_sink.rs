//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production), one line per
//! event with a fixed tag in front.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                let remaining = t.countdown_remaining_ms.map_or(-1, |ms| (ms / 1000) as i64);
                info!(
                    "TELEM | state={:?} | V={:.2}V I={:.1}mA R={:.1}\u{03a9} | amp={:.1}% | \
                     countdown={}s | locked={} | surface={} | rssi={}",
                    t.state,
                    t.voltage_v,
                    t.current_ma,
                    t.resistance_ohm,
                    t.amplitude.percent(),
                    remaining,
                    t.target_reached,
                    t.surface.as_str(),
                    t.wifi_rssi.map_or(0, i32::from),
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::TargetReached { current_ma, amplitude } => {
                info!(
                    "INJECT | target reached at {:.1}mA, amplitude {:.3}",
                    current_ma,
                    amplitude.value()
                );
            }
            AppEvent::CountdownExpired { from } => {
                info!("INJECT | countdown expired in {:?}, output stopped", from);
            }
            AppEvent::CommandRejected { source, error } => {
                warn!("CMD | {} command rejected: {}", source.as_str(), error);
            }
            AppEvent::SurfaceChanged(surface) => {
                info!("MODE | control surface -> {}", surface.as_str());
            }
            AppEvent::SensorStale { error, consecutive } => {
                debug!("METER | read failed ({}), stale x{}", error, consecutive);
            }
            AppEvent::NetworkChanged { connected } => {
                info!(
                    "NET | station {}",
                    if *connected { "connected" } else { "disconnected" }
                );
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}
