//! Injector DAC driver.
//!
//! The 8-bit DAC sets the injector amplitude. The amplitude-to-level
//! mapping lives in [`Amplitude::dac_level`](crate::control::Amplitude);
//! this driver only performs the write and remembers what it wrote.

use log::debug;

use super::hw_init;

pub struct InjectorDac {
    level: u8,
    writes: u32,
}

impl Default for InjectorDac {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectorDac {
    pub fn new() -> Self {
        Self { level: 0, writes: 0 }
    }

    /// One write per call, even when the level is unchanged.
    pub fn write(&mut self, level: u8) {
        hw_init::dac_write(level);
        if level != self.level {
            debug!("DAC: {} -> {}", self.level, level);
        }
        self.level = level;
        self.writes = self.writes.wrapping_add(1);
    }

    /// Last level written.
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn write_count(&self) -> u32 {
        self.writes
    }
}
