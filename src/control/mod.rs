//! Injector amplitude and the auto-injection current regulator.

pub mod amplitude;
pub mod regulator;

pub use amplitude::Amplitude;
pub use regulator::{RegulatorStep, StepRegulator};
