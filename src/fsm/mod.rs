//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌───────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId   │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├───────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Stopped   │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ Ready     │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ Running   │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ TimedRun  │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ Ramping   │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ Holding   │ fn(ctx)   │ —        │ fn(ctx)->Option<> │  │
//! │  │ Recording │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └───────────┴───────────┴──────────┴───────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext` which
//! holds the latest measurement, the amplitude, the countdown and the
//! injection session.
//!
//! The panel-facing [`SystemState`] and [`MenuSelection`] are projections
//! of the single [`StateId`], so the two can never disagree.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all possible device states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    /// Output off, amplitude zero.
    Stopped = 0,
    /// Output off, armed for the next run.
    Ready = 1,
    /// Manual run, no countdown.
    Running = 2,
    /// Manual run with the RUNTIME countdown.
    TimedRun = 3,
    /// Auto-injection driving toward the target current.
    Ramping = 4,
    /// Auto-injection locked on target, waiting for record.
    Holding = 5,
    /// Auto-injection recording window counting down.
    Recording = 6,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert a `u8` index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Stopped` in release (safe fallback).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Stopped,
            1 => Self::Ready,
            2 => Self::Running,
            3 => Self::TimedRun,
            4 => Self::Ramping,
            5 => Self::Holding,
            6 => Self::Recording,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Stopped
            }
        }
    }

    pub fn system_state(self) -> SystemState {
        match self {
            Self::Stopped => SystemState::Stopped,
            Self::Ready => SystemState::Ready,
            _ => SystemState::Run,
        }
    }

    pub fn menu(self) -> MenuSelection {
        match self {
            Self::TimedRun => MenuSelection::Runtime,
            Self::Running | Self::Ramping | Self::Holding | Self::Recording => MenuSelection::Run,
            Self::Stopped | Self::Ready => MenuSelection::Stop,
        }
    }

    /// An auto-injection session exists in this state.
    pub fn is_injecting(self) -> bool {
        matches!(self, Self::Ramping | Self::Holding | Self::Recording)
    }

    /// Output relay is energised in this state.
    pub fn is_running(self) -> bool {
        self.system_state() == SystemState::Run
    }
}

/// Coarse device state reported to the panel and the web UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Ready,
    Stopped,
    Run,
}

impl SystemState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Stopped => "STOP",
            Self::Run => "RUN",
        }
    }
}

/// Front-panel menu entry. The menu button steps backward through
/// `Stop → Run → Runtime → Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSelection {
    Runtime,
    Run,
    Stop,
}

impl MenuSelection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "RUNTIME",
            Self::Run => "RUN",
            Self::Stop => "STOP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNTIME" => Some(Self::Runtime),
            "RUN" => Some(Self::Run),
            "STOP" => Some(Self::Stop),
            _ => None,
        }
    }

    /// The entry one step back, wrapping.
    pub fn previous(self) -> Self {
        match self {
            Self::Runtime => Self::Stop,
            Self::Run => Self::Runtime,
            Self::Stop => Self::Run,
        }
    }

    /// State entered when this entry is executed.
    pub fn target_state(self) -> StateId {
        match self {
            Self::Runtime => StateId::TimedRun,
            Self::Run => StateId::Running,
            Self::Stop => StateId::Stopped,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and drives the
/// [`FsmContext`] that is threaded through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_since_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition to a different state. A request for
    /// the current state is a no-op; use [`Fsm::reenter`] to re-run entry.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Run `on_exit` then `on_enter` for the current state.
    pub fn reenter(&mut self, ctx: &mut FsmContext) {
        let id = self.current_state();
        self.transition(id, ctx);
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.state_since_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
