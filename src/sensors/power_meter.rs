//! JSY1050 power meter over Modbus RTU.
//!
//! Generic over any `embedded_io` byte stream so the same code drives the
//! ESP-IDF UART on target and an in-memory mock under test. Framing and
//! CRC are handled by `rmodbus`.
//!
//! ```text
//!  request:  [unit][0x03][reg_hi][reg_lo][cnt_hi][cnt_lo][crc_lo][crc_hi]
//!  response: [unit][0x03][bytes ][data × 2·cnt ...........][crc_lo][crc_hi]
//! ```

use embedded_io::{Read, Write};
use log::debug;
use rmodbus::ModbusProto;
use rmodbus::client::ModbusRequest;

use crate::config::SystemConfig;
use crate::error::SensorError;

use super::Measurement;

/// Exception responses are always this long.
const EXCEPTION_FRAME_LEN: usize = 5;

pub struct PowerMeter<S> {
    link: S,
    unit_id: u8,
    start_register: u16,
    register_count: u16,
}

impl<S: Read + Write> PowerMeter<S> {
    pub fn new(link: S, unit_id: u8, start_register: u16, register_count: u16) -> Self {
        Self {
            link,
            unit_id,
            start_register,
            register_count,
        }
    }

    pub fn from_config(link: S, config: &SystemConfig) -> Self {
        Self::new(
            link,
            config.meter_unit_id,
            config.meter_start_register,
            config.meter_register_count,
        )
    }

    /// Read the configured holding-register block.
    pub fn read_registers(&mut self) -> Result<Vec<u16>, SensorError> {
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        let mut frame: Vec<u8> = Vec::new();
        req.generate_get_holdings(self.start_register, self.register_count, &mut frame)
            .map_err(|_| SensorError::InvalidFrame)?;

        self.link
            .write_all(&frame)
            .map_err(|_| SensorError::WriteFailed)?;
        self.link.flush().map_err(|_| SensorError::WriteFailed)?;

        // unit + function + byte count + payload + crc
        let expected = 5 + 2 * self.register_count as usize;
        frame.clear();
        let mut chunk = [0u8; 32];
        while frame.len() < expected {
            let n = self
                .link
                .read(&mut chunk)
                .map_err(|_| SensorError::ReadFailed)?;
            if n == 0 {
                debug!("meter: timeout after {} of {} bytes", frame.len(), expected);
                return Err(SensorError::Timeout);
            }
            frame.extend_from_slice(&chunk[..n]);
            if frame.len() >= EXCEPTION_FRAME_LEN && frame[1] & 0x80 != 0 {
                break;
            }
        }

        let mut regs: Vec<u16> = Vec::new();
        req.parse_u16(&frame, &mut regs)
            .map_err(|_| SensorError::InvalidFrame)?;
        if regs.len() < self.register_count as usize {
            return Err(SensorError::ShortResponse);
        }
        Ok(regs)
    }

    pub fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        let regs = self.read_registers()?;
        Measurement::from_registers(&regs).ok_or(SensorError::ShortResponse)
    }

    /// Release the underlying link.
    pub fn into_inner(self) -> S {
        self.link
    }
}
