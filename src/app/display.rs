//! Local screen model.
//!
//! The display adapter only draws; what to draw is decided here from a
//! [`StatusSnapshot`] so the rules stay testable on the host.
//!
//! ```text
//!  ┌──────────── CORE Test ────────────┐   ┌──────────── CORE Test ────────────┐
//!  │ V:                        23.50   │   │        Mode: Web Server           │
//!  │ I:                         0.20   │   │         Controlled via            │
//!  │ R:                       117.50   │   │           Local Web               │
//!  │───────────────────────────────────│   │                                   │
//!  │ TIME:  01:42  [██████████░░░░]    │   │        SSID: CORE Test            │
//!  │ STATUS:                    RUN    │   │        IP: 192.168.4.1            │
//!  └───────────────────────────────────┘   └───────────────────────────────────┘
//!            local surface                          remote surface
//! ```

use core::fmt::Write;
use core::net::Ipv4Addr;

use crate::config::{AP_ADDRESS, AP_SSID};
use crate::fsm::SystemState;
use crate::sensors::Measurement;
use crate::timing::ClockLabel;

use super::commands::ControlSurface;
use super::status::StatusSnapshot;

/// Progress bar state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressBar {
    /// No bar drawn.
    Hidden,
    /// Empty outline.
    Empty,
    /// Fraction of the countdown still remaining, `0.0..=1.0`.
    Remaining(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelFrame {
    pub status_label: &'static str,
    /// Readings are shown only while the output runs.
    pub readings: Option<Measurement>,
    pub clock: ClockLabel,
    pub bar: ProgressBar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBanner {
    pub ap_ssid: &'static str,
    pub ap_address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayFrame {
    Panel(PanelFrame),
    Remote(RemoteBanner),
}

impl DisplayFrame {
    pub fn from_status(status: &StatusSnapshot) -> Self {
        if status.surface == ControlSurface::Remote {
            return Self::Remote(RemoteBanner {
                ap_ssid: AP_SSID,
                ap_address: Ipv4Addr::from(AP_ADDRESS),
            });
        }

        let system = status.system_state();
        let (clock, bar) = match (status.countdown, system) {
            (Some(cd), _) => (cd.label(), ProgressBar::Remaining(cd.remaining_fraction)),
            (None, SystemState::Run) => (label("∞"), ProgressBar::Hidden),
            (None, SystemState::Stopped) => (label("00:00"), ProgressBar::Empty),
            (None, SystemState::Ready) => (label("--:--"), ProgressBar::Hidden),
        };

        Self::Panel(PanelFrame {
            status_label: system.as_str(),
            readings: (system == SystemState::Run).then_some(status.measurement),
            clock,
            bar,
        })
    }
}

fn label(s: &str) -> ClockLabel {
    let mut out = ClockLabel::new();
    let _ = out.write_str(s);
    out
}
