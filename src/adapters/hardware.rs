//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the power meter, the injector DAC and the indicator outputs,
//! exposing them through [`SensorPort`] and [`ActuatorPort`].  This is the
//! only module in the system that touches the output hardware.  The meter
//! link is generic so host tests can script the serial traffic.

use embedded_io::{Read, Write};

use crate::app::ports::{ActuatorPort, IndicatorState, SensorPort};
use crate::drivers::dac::InjectorDac;
use crate::drivers::indicators::Indicators;
use crate::error::SensorError;
use crate::sensors::Measurement;
use crate::sensors::power_meter::PowerMeter;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<S> {
    meter: PowerMeter<S>,
    dac: InjectorDac,
    indicators: Indicators,
}

impl<S: Read + Write> HardwareAdapter<S> {
    pub fn new(meter: PowerMeter<S>, dac: InjectorDac, indicators: Indicators) -> Self {
        Self {
            meter,
            dac,
            indicators,
        }
    }

    pub fn dac_level(&self) -> u8 {
        self.dac.level()
    }

    pub fn indicators(&self) -> IndicatorState {
        self.indicators.current()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<S: Read + Write> SensorPort for HardwareAdapter<S> {
    fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        self.meter.read_measurement()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<S: Read + Write> ActuatorPort for HardwareAdapter<S> {
    fn write_dac(&mut self, level: u8) {
        self.dac.write(level);
    }

    fn set_indicators(&mut self, state: IndicatorState) {
        self.indicators.apply(state);
    }
}
