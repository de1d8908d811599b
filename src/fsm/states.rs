//! Concrete state handler functions and table builder.
//!
//! Each state is three plain `fn` pointers, with no closures or heap.
//!
//! ```text
//!  INIT ──[startup delay]──▶ IDLE ──[T + hyst > setpoint]──▶ CHILL_START
//!                             ▲                                  │
//!                             │                             [min run]
//!                        [min off]                               ▼
//!                             │                              CHILLING
//!                        POST_CHILL ◀──[T + hyst < setpoint]─────┘
//! ```
//!
//! The dwell timers in CHILL_START and POST_CHILL ignore temperature; they
//! only bound how short a pump on/off period can be.

use super::context::ReeferContext;
use super::{StateDescriptor, StateId};
use log::info;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Init,
            on_enter: Some(init_enter),
            on_exit: None,
            on_update: init_update,
        },
        StateDescriptor {
            id: StateId::Idle,
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::ChillStart,
            on_enter: Some(chill_start_enter),
            on_exit: None,
            on_update: chill_start_update,
        },
        StateDescriptor {
            id: StateId::Chilling,
            on_enter: None,
            on_exit: Some(chilling_exit),
            on_update: chilling_update,
        },
        StateDescriptor {
            id: StateId::PostChill,
            on_enter: Some(post_chill_enter),
            on_exit: None,
            on_update: post_chill_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT: let the probe settle after boot
// ═══════════════════════════════════════════════════════════════════════════

fn init_enter(ctx: &mut ReeferContext) {
    ctx.pump_on = false;
    ctx.start_dwell(ctx.timing.startup_delay_ms);
    info!("INIT: holding pump off for {}s", ctx.timing.startup_delay_ms / 1000);
}

fn init_update(ctx: &mut ReeferContext) -> Option<StateId> {
    ctx.dwell_elapsed().then_some(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: pump off, watching for the temperature to rise past the band
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut ReeferContext) -> Option<StateId> {
    ctx.above_band().then_some(StateId::ChillStart)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHILL_START: pump just switched on, minimum run enforced
// ═══════════════════════════════════════════════════════════════════════════

fn chill_start_enter(ctx: &mut ReeferContext) {
    ctx.pump_on = true;
    ctx.run_started = Some(ctx.now);
    ctx.start_dwell(ctx.timing.min_run_ms);
    info!(
        "CHILL: pump on at {:.1} (setpoint {:.1}, hyst {:.1})",
        ctx.temperature, ctx.setpoint, ctx.hysteresis
    );
}

fn chill_start_update(ctx: &mut ReeferContext) -> Option<StateId> {
    ctx.dwell_elapsed().then_some(StateId::Chilling)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHILLING: pump on until the temperature falls below the band
// ═══════════════════════════════════════════════════════════════════════════

fn chilling_update(ctx: &mut ReeferContext) -> Option<StateId> {
    ctx.below_band().then_some(StateId::PostChill)
}

fn chilling_exit(ctx: &mut ReeferContext) {
    ctx.pump_on = false;
    ctx.completed_run = ctx.current_run();
    ctx.run_started = None;
    info!("CHILL: pump off at {:.1}", ctx.temperature);
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST_CHILL: pump just switched off, minimum off-time enforced
// ═══════════════════════════════════════════════════════════════════════════

fn post_chill_enter(ctx: &mut ReeferContext) {
    ctx.pump_on = false;
    ctx.start_dwell(ctx.timing.min_off_ms);
}

fn post_chill_update(ctx: &mut ReeferContext) -> Option<StateId> {
    ctx.dwell_elapsed().then_some(StateId::Idle)
}
