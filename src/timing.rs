//! Millisecond time bookkeeping for the cooperative control loop.
//!
//! Nothing here reads a clock. Callers pass the current uptime in
//! milliseconds, which keeps every type deterministic under test.

use core::fmt::Write;

/// Fixed-size `mm:ss` label.
pub type ClockLabel = heapless::String<8>;

// ───────────────────────────────────────────────────────────────
// Interval gate
// ───────────────────────────────────────────────────────────────

/// Fires at most once per `period_ms`. The first call always fires.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Interval {
    pub const fn new(period_ms: u32) -> Self {
        Self {
            period_ms: period_ms as u64,
            last_ms: None,
        }
    }

    /// Returns `true` and re-arms when at least one period has elapsed.
    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.last_ms {
            Some(last) if now_ms.saturating_sub(last) < self.period_ms => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }
}

// ───────────────────────────────────────────────────────────────
// Countdown
// ───────────────────────────────────────────────────────────────

/// A single countdown window. The duration is fixed when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    start_ms: u64,
    duration_ms: u64,
}

impl Countdown {
    pub fn start(now_ms: u64, duration_ms: u64) -> Self {
        Self {
            start_ms: now_ms,
            duration_ms,
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Uptime at which the countdown reaches zero.
    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        self.duration_ms.saturating_sub(elapsed)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.remaining_ms(now_ms) == 0
    }

    /// Remaining fraction in `0.0..=1.0`; the bar drains from full to empty.
    pub fn remaining_fraction(&self, now_ms: u64) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.remaining_ms(now_ms) as f32 / self.duration_ms as f32
    }

    /// Remaining time as `mm:ss`.
    pub fn label(&self, now_ms: u64) -> ClockLabel {
        format_mm_ss(self.remaining_ms(now_ms))
    }
}

/// Render a millisecond span as `mm:ss` (whole seconds, truncated).
/// Minutes saturate at 99.
pub fn format_mm_ss(ms: u64) -> ClockLabel {
    // Two minute digits; anything longer pins to the largest label.
    let secs = (ms / 1000).min(99 * 60 + 59);
    let mut out = ClockLabel::new();
    let _ = write!(out, "{:02}:{:02}", secs / 60, secs % 60);
    out
}
