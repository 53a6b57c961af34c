//! Peripheral drivers and one-shot hardware initialisation.

pub mod dac;
pub mod hw_init;
pub mod indicators;
pub mod input;
pub mod uart_link;
