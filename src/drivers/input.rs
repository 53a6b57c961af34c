//! Polled front-panel inputs: menu button, rotary encoder, encoder push
//! switch and the local/web mode switch.
//!
//! Every input is sampled once per control-loop pass. Debouncing is
//! time-based and keeps its previous sample explicitly, so nothing here
//! sleeps or relies on interrupts.
//!
//! | Input        | Idle  | Active | Event                          |
//! |--------------|-------|--------|--------------------------------|
//! | Menu button  | high  | low    | [`PanelEvent::MenuPressed`]    |
//! | Encoder CLK  | high  | fall   | [`PanelEvent::EncoderStep`]    |
//! | Encoder SW   | high  | low    | [`PanelEvent::EncoderPressed`] |
//! | Mode switch  | high  | low    | surface = web                  |
//!
//! Pins are anything implementing `embedded_hal::digital::InputPin`; on
//! target that is [`GpioInput`], under test a scripted mock.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

use crate::app::commands::{AppCommand, ControlSurface};

use super::hw_init;

// ── Debouncer ─────────────────────────────────────────────────

/// Reports a level change once the raw input has held the new level for
/// the full window.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window_ms: u64,
    stable: bool,
    last_sample: bool,
    last_change_ms: u64,
}

impl Debouncer {
    pub fn new(window_ms: u32, initial: bool) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            stable: initial,
            last_sample: initial,
            last_change_ms: 0,
        }
    }

    /// Feed one raw sample. Returns the new stable level on a change.
    pub fn update(&mut self, level: bool, now_ms: u64) -> Option<bool> {
        if level != self.last_sample {
            self.last_sample = level;
            self.last_change_ms = now_ms;
            return None;
        }
        if level != self.stable && now_ms.saturating_sub(self.last_change_ms) >= self.window_ms {
            self.stable = level;
            return Some(level);
        }
        None
    }

    pub fn stable(&self) -> bool {
        self.stable
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    MenuPressed,
    /// One detent: `+1` clockwise, `-1` counter-clockwise.
    EncoderStep(i8),
    EncoderPressed,
}

impl From<PanelEvent> for AppCommand {
    fn from(event: PanelEvent) -> Self {
        match event {
            PanelEvent::MenuPressed => Self::CycleMenu,
            PanelEvent::EncoderStep(detents) => Self::AdjustAmplitude(detents),
            PanelEvent::EncoderPressed => Self::ZeroAmplitude,
        }
    }
}

// ── Push button ───────────────────────────────────────────────

/// Active-low push button. Fires once per debounced press.
pub struct PushButton<P> {
    pin: P,
    debounce: Debouncer,
}

impl<P: InputPin> PushButton<P> {
    pub fn new(pin: P, debounce_ms: u32) -> Self {
        Self {
            pin,
            debounce: Debouncer::new(debounce_ms, true),
        }
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        // A pin read error counts as released.
        let level = self.pin.is_high().unwrap_or(true);
        self.debounce.update(level, now_ms) == Some(false)
    }
}

// ── Rotary encoder ────────────────────────────────────────────

/// Quadrature encoder decoded on the falling edge of CLK: DT high at that
/// edge is one step clockwise, DT low one step counter-clockwise.
pub struct RotaryEncoder<C, D> {
    clk: C,
    dt: D,
    last_clk: bool,
}

impl<C: InputPin, D: InputPin> RotaryEncoder<C, D> {
    pub fn new(mut clk: C, dt: D) -> Self {
        let last_clk = clk.is_high().unwrap_or(true);
        Self { clk, dt, last_clk }
    }

    pub fn poll(&mut self) -> Option<i8> {
        let clk = self.clk.is_high().unwrap_or(self.last_clk);
        let falling = self.last_clk && !clk;
        self.last_clk = clk;
        if !falling {
            return None;
        }
        match self.dt.is_high() {
            Ok(true) => Some(1),
            Ok(false) => Some(-1),
            Err(_) => None,
        }
    }
}

// ── Mode switch ───────────────────────────────────────────────

/// Latching panel switch. Low selects the web surface.
pub struct ModeSwitch<P> {
    pin: P,
    debounce: Debouncer,
}

impl<P: InputPin> ModeSwitch<P> {
    /// Takes the boot position as already settled.
    pub fn new(mut pin: P, debounce_ms: u32) -> Self {
        let level = pin.is_high().unwrap_or(true);
        Self {
            pin,
            debounce: Debouncer::new(debounce_ms, level),
        }
    }

    pub fn surface(&self) -> ControlSurface {
        surface_for_level(self.debounce.stable())
    }

    /// Returns the new surface when the switch settles in a new position.
    pub fn poll(&mut self, now_ms: u64) -> Option<ControlSurface> {
        let level = self.pin.is_high().unwrap_or(self.debounce.stable());
        self.debounce.update(level, now_ms).map(surface_for_level)
    }
}

fn surface_for_level(high: bool) -> ControlSurface {
    if high {
        ControlSurface::Local
    } else {
        ControlSurface::Remote
    }
}

// ── Front panel ───────────────────────────────────────────────

/// The menu button, encoder and encoder switch sampled together.
pub struct FrontPanel<M, C, D, S> {
    menu: PushButton<M>,
    encoder: RotaryEncoder<C, D>,
    encoder_switch: PushButton<S>,
}

impl<M, C, D, S> FrontPanel<M, C, D, S>
where
    M: InputPin,
    C: InputPin,
    D: InputPin,
    S: InputPin,
{
    pub fn new(menu: M, clk: C, dt: D, switch: S, debounce_ms: u32) -> Self {
        Self {
            menu: PushButton::new(menu, debounce_ms),
            encoder: RotaryEncoder::new(clk, dt),
            encoder_switch: PushButton::new(switch, debounce_ms),
        }
    }

    /// Sample every input once. At most one event per input per pass.
    pub fn poll(&mut self, now_ms: u64) -> heapless::Vec<PanelEvent, 3> {
        let mut events = heapless::Vec::new();
        if self.menu.poll(now_ms) {
            let _ = events.push(PanelEvent::MenuPressed);
        }
        if let Some(dir) = self.encoder.poll() {
            let _ = events.push(PanelEvent::EncoderStep(dir));
        }
        if self.encoder_switch.poll(now_ms) {
            let _ = events.push(PanelEvent::EncoderPressed);
        }
        events
    }
}

// ── GPIO-backed pin ───────────────────────────────────────────

/// Input pin read through the raw GPIO helpers configured by `hw_init`.
#[derive(Debug, Clone, Copy)]
pub struct GpioInput(pub i32);

impl ErrorType for GpioInput {
    type Error = Infallible;
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.0))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!hw_init::gpio_read(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Pin whose level the test flips through a shared cell.
    #[derive(Clone)]
    struct FakePin(Rc<Cell<bool>>);

    impl FakePin {
        fn new(level: bool) -> Self {
            Self(Rc::new(Cell::new(level)))
        }
        fn set(&self, level: bool) {
            self.0.set(level);
        }
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.get())
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.get())
        }
    }

    #[test]
    fn debouncer_ignores_short_glitch() {
        let mut d = Debouncer::new(50, true);
        assert_eq!(d.update(false, 100), None);
        assert_eq!(d.update(true, 120), None);
        assert_eq!(d.update(true, 200), None);
        assert!(d.stable());
    }

    #[test]
    fn debouncer_reports_change_after_window() {
        let mut d = Debouncer::new(50, true);
        assert_eq!(d.update(false, 100), None);
        assert_eq!(d.update(false, 149), None);
        assert_eq!(d.update(false, 150), Some(false));
        // reported once
        assert_eq!(d.update(false, 300), None);
    }

    #[test]
    fn button_fires_once_per_press() {
        let pin = FakePin::new(true);
        let mut btn = PushButton::new(pin.clone(), 50);
        pin.set(false);
        assert!(!btn.poll(0));
        assert!(!btn.poll(30));
        assert!(btn.poll(60));
        assert!(!btn.poll(500));
        pin.set(true);
        assert!(!btn.poll(510));
        assert!(!btn.poll(600));
        pin.set(false);
        assert!(!btn.poll(700));
        assert!(btn.poll(760));
    }

    #[test]
    fn encoder_direction_follows_dt_at_clk_fall() {
        let clk = FakePin::new(true);
        let dt = FakePin::new(true);
        let mut enc = RotaryEncoder::new(clk.clone(), dt.clone());
        assert_eq!(enc.poll(), None);

        clk.set(false);
        assert_eq!(enc.poll(), Some(1));
        assert_eq!(enc.poll(), None);

        clk.set(true);
        dt.set(false);
        assert_eq!(enc.poll(), None);
        clk.set(false);
        assert_eq!(enc.poll(), Some(-1));
    }

    #[test]
    fn mode_switch_starts_at_boot_position() {
        let pin = FakePin::new(false);
        let sw = ModeSwitch::new(pin, 50);
        assert_eq!(sw.surface(), ControlSurface::Remote);
    }

    #[test]
    fn mode_switch_reports_debounced_flip() {
        let pin = FakePin::new(true);
        let mut sw = ModeSwitch::new(pin.clone(), 50);
        pin.set(false);
        assert_eq!(sw.poll(1_000), None);
        assert_eq!(sw.poll(1_060), Some(ControlSurface::Remote));
        assert_eq!(sw.surface(), ControlSurface::Remote);
        pin.set(true);
        assert_eq!(sw.poll(2_000), None);
        assert_eq!(sw.poll(2_050), Some(ControlSurface::Local));
    }

    #[test]
    fn panel_events_map_to_commands() {
        assert_eq!(AppCommand::from(PanelEvent::MenuPressed), AppCommand::CycleMenu);
        assert_eq!(
            AppCommand::from(PanelEvent::EncoderStep(-1)),
            AppCommand::AdjustAmplitude(-1)
        );
        assert_eq!(AppCommand::from(PanelEvent::EncoderPressed), AppCommand::ZeroAmplitude);
    }

    #[test]
    fn front_panel_collects_simultaneous_events() {
        let menu = FakePin::new(true);
        let clk = FakePin::new(true);
        let dt = FakePin::new(false);
        let sw = FakePin::new(true);
        let mut panel = FrontPanel::new(menu.clone(), clk.clone(), dt, sw.clone(), 50);

        menu.set(false);
        sw.set(false);
        assert!(panel.poll(0).is_empty());
        clk.set(false);
        let events = panel.poll(60);
        assert_eq!(
            events.as_slice(),
            &[
                PanelEvent::MenuPressed,
                PanelEvent::EncoderStep(-1),
                PanelEvent::EncoderPressed
            ]
        );
    }
}
