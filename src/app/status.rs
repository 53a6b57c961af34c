//! Point-in-time device status shared by the web API and the display.

use core::net::Ipv4Addr;

use crate::control::Amplitude;
use crate::fsm::{MenuSelection, StateId, SystemState};
use crate::sensors::Measurement;
use crate::timing::{ClockLabel, Countdown, format_mm_ss};

use super::commands::ControlSurface;

/// Station link as last observed by the network supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    pub connected: bool,
    pub ssid: heapless::String<32>,
    pub rssi: Option<i8>,
    pub local_ip: Option<Ipv4Addr>,
    /// Relay endpoint from the stored settings.
    pub cloud_url: heapless::String<128>,
}

/// Countdown as seen at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownView {
    pub remaining_ms: u64,
    /// Uptime at which the countdown reaches zero.
    pub end_ms: u64,
    pub remaining_fraction: f32,
}

impl CountdownView {
    pub fn at(countdown: &Countdown, now_ms: u64) -> Self {
        Self {
            remaining_ms: countdown.remaining_ms(now_ms),
            end_ms: countdown.end_ms(),
            remaining_fraction: countdown.remaining_fraction(now_ms),
        }
    }

    pub fn label(&self) -> ClockLabel {
        format_mm_ss(self.remaining_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub uptime_ms: u64,
    pub state: StateId,
    pub measurement: Measurement,
    pub amplitude: Amplitude,
    pub countdown: Option<CountdownView>,
    pub target_reached: bool,
    pub surface: ControlSurface,
    pub network: NetworkStatus,
}

impl StatusSnapshot {
    pub fn system_state(&self) -> SystemState {
        self.state.system_state()
    }

    pub fn menu(&self) -> MenuSelection {
        self.state.menu()
    }

    pub fn auto_injection_active(&self) -> bool {
        self.state.is_injecting()
    }

    pub fn countdown_active(&self) -> bool {
        self.countdown.is_some()
    }
}
