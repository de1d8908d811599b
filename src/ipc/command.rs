//! Single-slot request/response protocol layered on the channel.
//!
//! The control core writes `command` + `command_seq`; the sensor core
//! answers by copying both into `ack` + `ack_seq` and clearing `command`
//! in the same exchange. The sequence number lets the client drop a late
//! answer to a request it has already abandoned, and keeps a late answer
//! from clearing the request that replaced it.

use log::{debug, warn};

use super::SharedStateChannel;
use super::state::{CommandKind, SharedState, UpdateMask};
use crate::error::{ChannelError, CommandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed { kind: CommandKind, elapsed_ticks: u32 },
    TimedOut { kind: CommandKind },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: CommandKind,
    seq: u16,
    sent_tick: u32,
}

/// Control-core side of the remote call.
pub struct CommandClient {
    pending: Option<Pending>,
    next_seq: u16,
    timeout_ticks: u32,
}

impl CommandClient {
    pub fn new(timeout_ticks: u32) -> Self {
        Self {
            pending: None,
            next_seq: 1,
            timeout_ticks,
        }
    }

    /// The request currently occupying the slot, if any.
    pub fn outstanding(&self) -> Option<CommandKind> {
        self.pending.map(|p| p.kind)
    }

    /// Publish `kind` into the command slot.
    ///
    /// Refuses while a previous request is still within its timeout, so the
    /// client never overwrites its own live request.
    pub fn send(
        &mut self,
        kind: CommandKind,
        tick: u32,
        channel: &SharedStateChannel,
        working: &mut SharedState,
    ) -> Result<u16, CommandError> {
        if kind == CommandKind::NoCommand {
            return Err(CommandError::Empty);
        }
        if let Some(p) = self.pending {
            if !self.expired(p, tick) {
                return Err(CommandError::Busy(p.kind));
            }
            warn!("cmd: {} (seq {}) abandoned for {}", p.kind.label(), p.seq, kind.label());
            self.pending = None;
        }

        let seq = self.next_seq;
        self.next_seq = match self.next_seq.wrapping_add(1) {
            0 => 1,
            n => n,
        };

        working.command = kind;
        working.command_seq = seq;
        channel.exchange(UpdateMask::COMMAND, working)?;

        self.pending = Some(Pending {
            kind,
            seq,
            sent_tick: tick,
        });
        debug!("cmd: sent {} (seq {})", kind.label(), seq);
        Ok(seq)
    }

    /// Inspect the latest snapshot in `working` for a response.
    ///
    /// Any ack found is consumed and the ack slot reset to `NoCommand`,
    /// whether it answers the outstanding request or a stale one.
    pub fn poll(
        &mut self,
        tick: u32,
        channel: &SharedStateChannel,
        working: &mut SharedState,
    ) -> Result<Option<CommandOutcome>, ChannelError> {
        let mut outcome = None;

        if working.ack != CommandKind::NoCommand {
            let (ack, ack_seq) = (working.ack, working.ack_seq);
            match self.pending {
                Some(p) if p.kind == ack && p.seq == ack_seq => {
                    outcome = Some(CommandOutcome::Completed {
                        kind: ack,
                        elapsed_ticks: tick.wrapping_sub(p.sent_tick),
                    });
                    self.pending = None;
                }
                _ => debug!("cmd: discarding stale ack {} (seq {})", ack.label(), ack_seq),
            }

            working.ack = CommandKind::NoCommand;
            working.ack_seq = 0;
            channel.exchange(UpdateMask::ACK, working)?;
        }

        if let Some(p) = self.pending {
            if outcome.is_none() && self.expired(p, tick) {
                self.pending = None;
                outcome = Some(CommandOutcome::TimedOut { kind: p.kind });
            }
        }

        Ok(outcome)
    }

    fn expired(&self, p: Pending, tick: u32) -> bool {
        tick.wrapping_sub(p.sent_tick) >= self.timeout_ticks
    }
}

/// Sensor-core side: answer whatever request sits in `working.command`.
///
/// `handler` writes its results into the working copy and returns the
/// field groups it touched, or `None` if it cannot serve the request right
/// now. In both cases the command slot is cleared, unless the client has
/// meanwhile replaced the request with a newer one; only a served request
/// is acknowledged. Everything goes out in a single exchange.
pub fn serve_command(
    channel: &SharedStateChannel,
    working: &mut SharedState,
    handler: impl FnOnce(CommandKind, &mut SharedState) -> Option<UpdateMask>,
) -> Result<Option<CommandKind>, ChannelError> {
    let kind = working.command;
    if kind == CommandKind::NoCommand {
        return Ok(None);
    }

    let served = handler(kind, working);
    let mut dirty = UpdateMask::COMMAND_DONE;
    working.command = CommandKind::NoCommand;
    if let Some(fields) = served {
        working.ack = kind;
        working.ack_seq = working.command_seq;
        dirty |= UpdateMask::ACK | fields;
    } else {
        debug!("cmd: {} dropped unserved", kind.label());
    }

    channel.exchange(dirty, working)?;
    Ok(served.map(|_| kind))
}
