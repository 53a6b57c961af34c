//! Sensor subsystem — the JSY1050 power meter and the [`Measurement`] it
//! produces.
//!
//! The meter is polled on a fixed interval independent of device state.
//! A failed poll leaves the previous [`Measurement`] in place; the caller
//! decides what to log.

pub mod power_meter;

/// Below this current (A) resistance is reported as zero.
pub const RESISTANCE_MIN_CURRENT_A: f32 = 0.01;

/// One voltage/current reading with the derived load resistance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    pub voltage_v: f32,
    pub current_a: f32,
    pub resistance_ohm: f32,
}

impl Measurement {
    /// Build from a fresh voltage/current pair. Negative inputs read as 0.
    pub fn new(voltage_v: f32, current_a: f32) -> Self {
        let voltage_v = voltage_v.max(0.0);
        let current_a = current_a.max(0.0);
        let resistance_ohm = if current_a > RESISTANCE_MIN_CURRENT_A {
            voltage_v / current_a
        } else {
            0.0
        };
        Self {
            voltage_v,
            current_a,
            resistance_ohm,
        }
    }

    /// Decode the meter's holding-register block: register 0 is voltage
    /// and register 1 is current, both in hundredths.
    pub fn from_registers(regs: &[u16]) -> Option<Self> {
        match regs {
            [v, i, ..] => Some(Self::new(f32::from(*v) / 100.0, f32::from(*i) / 100.0)),
            _ => None,
        }
    }

    pub fn current_ma(&self) -> f32 {
        self.current_a * 1000.0
    }
}
