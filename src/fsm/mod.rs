//! Function-pointer finite state machine engine for the reefer pump.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Init       │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Idle       │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  │ ChillStart │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ Chilling   │ -         │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ PostChill  │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  └────────────┴───────────┴──────────┴───────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer. All functions receive `&mut ReeferContext`, which
//! carries the latest temperature, the setpoint band, the dwell deadline
//! and the pump command.
//!
//! At most one transition happens per tick.

pub mod context;
pub mod states;

use context::ReeferContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Init = 0,
    Idle = 1,
    ChillStart = 2,
    Chilling = 3,
    PostChill = 4,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 5;

    /// Human-readable name, as shown in status output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Idle => "Idle",
            Self::ChillStart => "Chill Starting",
            Self::Chilling => "Chilling",
            Self::PostChill => "Post Chill",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut ReeferContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut ReeferContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns only the state table and the current index; everything else lives
/// in the [`ReeferContext`] threaded through each call.
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
    pub fn start(&mut self, ctx: &mut ReeferContext) {
        info!("FSM starting in state: {}", self.current_state().name());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one evaluation at `ctx.now`.
    ///
    /// Returns the `(from, to)` pair if a transition happened.
    pub fn tick(&mut self, ctx: &mut ReeferContext) -> Option<(StateId, StateId)> {
        let next = (self.table[self.current].on_update)(ctx)?;
        let from = self.current_state();
        self.transition(next, ctx);
        Some((from, next))
    }

    /// Force an immediate transition, running exit and entry actions.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut ReeferContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut ReeferContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.current_state().name(),
            next_id.name()
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
