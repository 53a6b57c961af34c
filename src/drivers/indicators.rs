//! Front-panel LEDs and the output relay.
//!
//! LEDs are active-high. The relay is active-low: the pin is driven low to
//! energise the coil.

use log::info;

use crate::app::ports::IndicatorState;
use crate::pins;

use super::hw_init;

/// Pin level that produces the requested relay state.
pub const fn relay_level(energized: bool) -> bool {
    !energized
}

pub struct Indicators {
    current: IndicatorState,
}

impl Default for Indicators {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicators {
    /// Matches the boot levels set by `hw_init`: STOP lit, relay open.
    pub fn new() -> Self {
        Self {
            current: IndicatorState {
                stop_led: true,
                ..IndicatorState::default()
            },
        }
    }

    pub fn apply(&mut self, state: IndicatorState) {
        hw_init::gpio_write(pins::LED_RUNTIME_GPIO, state.runtime_led);
        hw_init::gpio_write(pins::LED_RUN_GPIO, state.run_led);
        hw_init::gpio_write(pins::LED_STOP_GPIO, state.stop_led);
        hw_init::gpio_write(pins::RELAY_GPIO, relay_level(state.relay_energized));

        if state.relay_energized != self.current.relay_energized {
            info!(
                "Relay: {}",
                if state.relay_energized { "energised" } else { "open" }
            );
        }
        self.current = state;
    }

    pub fn current(&self) -> IndicatorState {
        self.current
    }
}
