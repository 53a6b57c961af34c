//! Normalised injector amplitude.
//!
//! The only way to build an [`Amplitude`] clamps into `0.0..=1.0`, so
//! every value that reaches the DAC is already in range.

/// Normalised drive level in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Amplitude(f32);

impl Amplitude {
    pub const ZERO: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    /// Clamp `value` into range. NaN maps to zero.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Build from a 0–100 percentage (out-of-range input is clamped).
    pub fn from_percent(percent: f32) -> Self {
        Self::new(percent / 100.0)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn percent(self) -> f32 {
        self.0 * 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// Shift by `delta` and clamp.
    #[must_use]
    pub fn offset(self, delta: f32) -> Self {
        Self::new(self.0 + delta)
    }

    /// 8-bit DAC code: `trunc(value × 255)`.
    pub fn dac_level(self) -> u8 {
        (self.0 * 255.0) as u8
    }
}
