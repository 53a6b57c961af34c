//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  This is the classic embedded C FSM pattern
//! expressed in safe Rust.
//!
//! ```text
//!            ┌──────────── menu / stop / expiry ───────────┐
//!            ▼                                             │
//!  STOPPED ──[RUN]──▶ RUNNING        TIMED_RUN ──[expiry]──┤
//!     ▲                  │               ▲                 │
//!     │             [inject]        [RUNTIME]              │
//!     │                  ▼                                 │
//!     │             RAMPING ──[lock]──▶ HOLDING            │
//!     │                                   │                │
//!     │                              [record]              │
//!     │                                   ▼                │
//!     └────────────[expiry]─────── RECORDING ──────────────┘
//! ```
//!
//! `READY` is entered only on explicit request and behaves like `STOPPED`.

use super::context::{FsmContext, InjectionSession};
use super::{StateDescriptor, StateId};
use crate::control::RegulatorStep;
use crate::timing::Countdown;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Stopped
        StateDescriptor {
            id: StateId::Stopped,
            name: "Stopped",
            on_enter: Some(stopped_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1 — Ready
        StateDescriptor {
            id: StateId::Ready,
            name: "Ready",
            on_enter: Some(ready_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 2 — Running
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 3 — TimedRun
        StateDescriptor {
            id: StateId::TimedRun,
            name: "TimedRun",
            on_enter: Some(timed_run_enter),
            on_exit: None,
            on_update: timed_run_update,
        },
        // Index 4 — Ramping
        StateDescriptor {
            id: StateId::Ramping,
            name: "Ramping",
            on_enter: Some(ramping_enter),
            on_exit: None,
            on_update: ramping_update,
        },
        // Index 5 — Holding
        StateDescriptor {
            id: StateId::Holding,
            name: "Holding",
            on_enter: Some(holding_enter),
            on_exit: None,
            on_update: holding_update,
        },
        // Index 6 — Recording
        StateDescriptor {
            id: StateId::Recording,
            name: "Recording",
            on_enter: Some(recording_enter),
            on_exit: Some(recording_exit),
            on_update: recording_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Output off and every timer or session dropped.
fn reset_outputs(ctx: &mut FsmContext) {
    ctx.set_amplitude(crate::control::Amplitude::ZERO);
    ctx.countdown = None;
    ctx.session = None;
    ctx.last_step = None;
}

fn idle_update(_ctx: &mut FsmContext) -> Option<StateId> {
    None
}

/// One regulator evaluation, rate-limited to `control_tick_ms`.
/// Returns `true` when the measured current is inside tolerance.
fn regulate(ctx: &mut FsmContext) -> bool {
    let Some(mut session) = ctx.session else {
        return false;
    };
    let period = u64::from(ctx.config.control_tick_ms);
    if let Some(last) = session.last_step_ms {
        if ctx.now_ms.saturating_sub(last) < period {
            return false;
        }
    }
    session.last_step_ms = Some(ctx.now_ms);

    let step = ctx
        .regulator
        .step(ctx.measurement.current_ma(), ctx.amplitude);
    ctx.last_step = Some(step);

    let locked = match step {
        RegulatorStep::Locked { .. } => {
            session.target_reached = true;
            true
        }
        RegulatorStep::Adjusted {
            error_ma,
            step,
            amplitude,
        } => {
            debug!(
                "regulator: error {:.1} mA, step {:+.3}, amplitude {:.3}",
                error_ma,
                step,
                amplitude.value()
            );
            ctx.set_amplitude(amplitude);
            false
        }
    };
    ctx.session = Some(session);
    locked
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOPPED / READY — output off
// ═══════════════════════════════════════════════════════════════════════════

fn stopped_enter(ctx: &mut FsmContext) {
    reset_outputs(ctx);
    info!("STOPPED: output off, amplitude zero");
}

fn ready_enter(ctx: &mut FsmContext) {
    reset_outputs(ctx);
    info!("READY: output off, awaiting run");
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING / TIMED_RUN — manual amplitude
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut FsmContext) {
    ctx.countdown = None;
    ctx.session = None;
    info!("RUNNING: manual output at {:.1}%", ctx.amplitude.percent());
}

fn timed_run_enter(ctx: &mut FsmContext) {
    let duration = u64::from(ctx.config.runtime_countdown_ms);
    ctx.countdown = Some(Countdown::start(ctx.now_ms, duration));
    ctx.session = None;
    info!("TIMED_RUN: countdown {} ms", duration);
}

fn timed_run_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.countdown_expired() {
        info!("TIMED_RUN: countdown expired → stopping");
        return Some(StateId::Stopped);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RAMPING — auto-injection driving toward target
// ═══════════════════════════════════════════════════════════════════════════

fn ramping_enter(ctx: &mut FsmContext) {
    let window = ctx
        .session
        .map_or(u64::from(ctx.config.record_countdown_ms), |s| {
            s.record_window_ms
        });
    ctx.session = Some(InjectionSession::new(window));
    ctx.countdown = None;
    ctx.last_step = None;
    ctx.set_amplitude(crate::control::Amplitude::ZERO);
    info!(
        "RAMPING: target {:.0} mA ±{:.0}",
        ctx.regulator.target_ma(),
        ctx.config.tolerance_ma
    );
}

fn ramping_update(ctx: &mut FsmContext) -> Option<StateId> {
    if regulate(ctx) {
        info!(
            "RAMPING: locked at {:.1} mA, amplitude {:.3}",
            ctx.measurement.current_ma(),
            ctx.amplitude.value()
        );
        return Some(StateId::Holding);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOLDING — on target, waiting for record
// ═══════════════════════════════════════════════════════════════════════════

fn holding_enter(ctx: &mut FsmContext) {
    if let Some(s) = ctx.session.as_mut() {
        s.target_reached = true;
    }
    ctx.countdown = None;
    info!("HOLDING: target reached, recording available");
}

fn holding_update(ctx: &mut FsmContext) -> Option<StateId> {
    regulate(ctx);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECORDING — countdown running, still regulating
// ═══════════════════════════════════════════════════════════════════════════

fn recording_enter(ctx: &mut FsmContext) {
    let window = ctx
        .session
        .map_or(u64::from(ctx.config.record_countdown_ms), |s| {
            s.record_window_ms
        });
    ctx.countdown = Some(Countdown::start(ctx.now_ms, window));
    info!("RECORDING: window {} ms", window);
}

fn recording_exit(ctx: &mut FsmContext) {
    ctx.countdown = None;
    info!("RECORDING: window closed after {} ms", ctx.ms_in_state());
}

fn recording_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.countdown_expired() {
        info!("RECORDING: countdown expired → stopping");
        return Some(StateId::Stopped);
    }
    regulate(ctx);
    None
}
