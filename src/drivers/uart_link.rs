//! Byte-stream link to the power meter.
//!
//! Wraps the ESP-IDF UART driver in the blocking `embedded_io` traits the
//! [`PowerMeter`](crate::sensors::power_meter::PowerMeter) is generic
//! over. Reads wait at most the configured timeout and report a timeout as
//! a zero-length read.

use embedded_io::{ErrorKind, ErrorType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    Uart(i32),
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Uart(rc) => write!(f, "UART error (rc={})", rc),
        }
    }
}

impl embedded_io::Error for LinkError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[cfg(target_os = "espidf")]
mod esp_impl {
    use esp_idf_hal::delay::TickType;
    use esp_idf_hal::gpio::AnyIOPin;
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::uart::{config::Config, Uart, UartDriver};
    use esp_idf_hal::units::Hertz;
    use log::info;

    use super::{ErrorType, LinkError};
    use crate::drivers::hw_init::HwInitError;
    use crate::pins;

    pub struct UartLink<'d> {
        uart: UartDriver<'d>,
        timeout_ticks: u32,
    }

    impl<'d> UartLink<'d> {
        /// Open the meter UART at 9600 8N1.
        pub fn new<U: Uart>(
            uart: impl Peripheral<P = U> + 'd,
            tx: AnyIOPin,
            rx: AnyIOPin,
            timeout_ms: u32,
        ) -> Result<Self, HwInitError> {
            let config = Config::new().baudrate(Hertz(pins::METER_BAUD));
            let uart = UartDriver::new(
                uart,
                tx,
                rx,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &config,
            )
            .map_err(|e| HwInitError::UartInitFailed(e.code()))?;
            info!(
                "uart_link: meter UART{} ready (tx={}, rx={}, {} baud)",
                pins::METER_UART_PORT,
                pins::METER_TX_GPIO,
                pins::METER_RX_GPIO,
                pins::METER_BAUD
            );
            Ok(Self {
                uart,
                timeout_ticks: TickType::new_millis(u64::from(timeout_ms)).ticks(),
            })
        }
    }

    impl ErrorType for UartLink<'_> {
        type Error = LinkError;
    }

    impl embedded_io::Read for UartLink<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            match self.uart.read(buf, self.timeout_ticks) {
                Ok(n) => Ok(n),
                Err(e) if e.code() == esp_idf_hal::sys::ESP_ERR_TIMEOUT as i32 => Ok(0),
                Err(e) => Err(LinkError::Uart(e.code())),
            }
        }
    }

    impl embedded_io::Write for UartLink<'_> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            // Drop anything left over from a previous, abandoned exchange.
            let _ = self.uart.clear_rx();
            self.uart.write(buf).map_err(|e| LinkError::Uart(e.code()))
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.uart
                .wait_tx_done(self.timeout_ticks)
                .map_err(|e| LinkError::Uart(e.code()))
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp_impl::UartLink;

/// Host stand-in: accepts every write and never answers, so every meter
/// poll times out and the last reading is kept.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct UartLink;

#[cfg(not(target_os = "espidf"))]
impl ErrorType for UartLink {
    type Error = LinkError;
}

#[cfg(not(target_os = "espidf"))]
impl embedded_io::Read for UartLink {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

#[cfg(not(target_os = "espidf"))]
impl embedded_io::Write for UartLink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
