//! Step-adaptive current regulator for auto-injection.
//!
//! Each call compares the measured current against the target and nudges
//! the amplitude by a step chosen from the error band:
//!
//! ```text
//!   |error| <= tolerance      → locked, amplitude unchanged
//!   |error| >  coarse (50 mA) → ±coarse step (0.010)
//!   |error| >  medium (20 mA) → ±medium step (0.005)
//!   otherwise                 → ±fine step   (0.001)
//! ```
//!
//! The sign follows the error: below target steps up, above target steps
//! down. The regulator holds no state; the caller owns the amplitude and
//! the step cadence.

use crate::config::{StepBands, SystemConfig};

use super::Amplitude;

/// Outcome of one regulator evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegulatorStep {
    /// Measured current is within tolerance of the target.
    Locked { error_ma: f32 },
    /// Amplitude moved by `step` (signed) toward the target.
    Adjusted {
        error_ma: f32,
        step: f32,
        amplitude: Amplitude,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct StepRegulator {
    target_ma: f32,
    tolerance_ma: f32,
    bands: StepBands,
}

impl StepRegulator {
    pub fn new(target_ma: f32, tolerance_ma: f32, bands: StepBands) -> Self {
        Self {
            target_ma,
            tolerance_ma,
            bands,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(config.target_current_ma, config.tolerance_ma, config.step_bands)
    }

    pub fn target_ma(&self) -> f32 {
        self.target_ma
    }

    /// Unsigned step for an absolute error outside tolerance.
    pub fn step_size(&self, abs_error_ma: f32) -> f32 {
        if abs_error_ma > self.bands.coarse_error_ma {
            self.bands.coarse_step
        } else if abs_error_ma > self.bands.medium_error_ma {
            self.bands.medium_step
        } else {
            self.bands.fine_step
        }
    }

    pub fn step(&self, measured_ma: f32, amplitude: Amplitude) -> RegulatorStep {
        let error_ma = self.target_ma - measured_ma;
        if error_ma.abs() <= self.tolerance_ma {
            return RegulatorStep::Locked { error_ma };
        }
        let step = self.step_size(error_ma.abs()).copysign(error_ma);
        RegulatorStep::Adjusted {
            error_ma,
            step,
            amplitude: amplitude.offset(step),
        }
    }
}
