//! `/status` document.
//!
//! Field order and rounding follow what the web UI parses: voltage and
//! resistance to 2 decimals, current (A) and amplitude to 3. The countdown
//! fields appear only while a countdown runs.

use serde::Serialize;

use crate::app::status::StatusSnapshot;
use crate::timing::ClockLabel;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusJson<'a> {
    pub voltage: f64,
    pub current: f64,
    pub resistance: f64,
    pub state: &'static str,
    pub amplitude: f64,
    pub countdown_active: bool,
    pub auto_injection_active: bool,
    pub target_reached: bool,
    pub wifi_connected: bool,
    #[serde(rename = "wifiSSID")]
    pub wifi_ssid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_time: Option<ClockLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_end_time: Option<u64>,
    pub menu: &'static str,
    pub control: &'static str,
}

impl<'a> StatusJson<'a> {
    pub fn from_snapshot(s: &'a StatusSnapshot) -> Self {
        Self {
            voltage: round_to(s.measurement.voltage_v, 2),
            current: round_to(s.measurement.current_a, 3),
            resistance: round_to(s.measurement.resistance_ohm, 2),
            state: s.system_state().as_str(),
            amplitude: round_to(s.amplitude.value(), 3),
            countdown_active: s.countdown_active(),
            auto_injection_active: s.auto_injection_active(),
            target_reached: s.target_reached,
            wifi_connected: s.network.connected,
            wifi_ssid: &s.network.ssid,
            countdown_time: s.countdown.map(|c| c.label()),
            countdown_end_time: s.countdown.map(|c| c.end_ms),
            menu: s.menu().as_str(),
            control: s.surface.as_str(),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain struct of numbers and strings; serialisation cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Round half away from zero to `places` decimals.
fn round_to(value: f32, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (f64::from(value) * scale).round() / scale
}
