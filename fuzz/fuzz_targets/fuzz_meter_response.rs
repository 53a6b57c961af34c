//! Fuzz target: `PowerMeter::read_measurement`
//!
//! Replays arbitrary bytes as the meter's answer to one holding-register
//! read. The decoder must return a typed error or a finite, non-negative
//! measurement, never panic.
//!
//! cargo fuzz run fuzz_meter_response

#![no_main]

use coretest::sensors::power_meter::PowerMeter;
use libfuzzer_sys::fuzz_target;

/// Serial port whose receive side is the fuzz input.
struct Replay<'a> {
    rx: &'a [u8],
}

impl embedded_io::ErrorType for Replay<'_> {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Read for Replay<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx = &self.rx[n..];
        Ok(n)
    }
}

impl embedded_io::Write for Replay<'_> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut meter = PowerMeter::new(Replay { rx: data }, 1, 0x0048, 10);
    if let Ok(m) = meter.read_measurement() {
        assert!(m.voltage_v.is_finite() && m.voltage_v >= 0.0);
        assert!(m.current_a.is_finite() && m.current_a >= 0.0);
        assert!(m.resistance_ohm.is_finite() && m.resistance_ohm >= 0.0);
    }
});
