//! Cooperation states.
//!
//! [`State`] is a closed enum; each variant handles the events forwarded to
//! it by the state machine and answers with a [`Transition`]. Only the
//! machine swaps states, so enter/leave hooks and the status broadcast
//! always run.

mod free;
mod in_state;
mod out;
mod relay;

pub use free::FreeState;
pub use in_state::InState;
pub use out::OutState;
pub use relay::{PendingRelay, RelayPhase};

use cooperate_types::{
    CoordinationErrCode, CooperateEvent, CooperateOptions, CooperateStatus, PeerMessage,
    StartCooperateEvent, StartWithOptionsEvent, StopCooperateEvent,
};
use tracing::info;

use crate::context::Context;

/// What a state asks the machine to do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    To(CooperateStatus),
}

#[derive(Debug)]
pub enum State {
    Free(FreeState),
    Out(OutState),
    In(InState),
}

impl State {
    pub fn new(status: CooperateStatus) -> Self {
        match status {
            CooperateStatus::Free => Self::Free(FreeState),
            CooperateStatus::Out => Self::Out(OutState),
            CooperateStatus::In => Self::In(InState::default()),
        }
    }

    pub fn status(&self) -> CooperateStatus {
        match self {
            Self::Free(_) => CooperateStatus::Free,
            Self::Out(_) => CooperateStatus::Out,
            Self::In(_) => CooperateStatus::In,
        }
    }

    pub fn on_event(&mut self, ctx: &mut Context, event: CooperateEvent) -> Transition {
        match self {
            Self::Free(state) => state.on_event(ctx, event),
            Self::Out(state) => state.on_event(ctx, event),
            Self::In(state) => state.on_event(ctx, event),
        }
    }

    pub fn on_enter(&mut self, ctx: &mut Context) {
        match self {
            Self::Free(_) | Self::Out(_) => {}
            Self::In(state) => state.on_enter(ctx),
        }
    }

    pub fn on_leave(&mut self, ctx: &mut Context) {
        match self {
            Self::Free(_) | Self::Out(_) => {}
            Self::In(state) => state.on_leave(ctx),
        }
    }

    /// Cancel every timer the state owns. Used on shutdown.
    pub fn cancel_timers(&mut self, ctx: &mut Context) {
        if let Self::In(state) = self {
            state.cancel_relay(ctx, CoordinationErrCode::Cancelled);
        }
    }

    pub fn relay_phase(&self) -> Option<&RelayPhase> {
        match self {
            Self::In(state) => Some(state.relay()),
            Self::Free(_) | Self::Out(_) => None,
        }
    }
}

/// `Start` and `StartWithOptions` share one handling path.
#[derive(Debug)]
pub struct StartRequest {
    pub event: StartCooperateEvent,
    pub options: Option<CooperateOptions>,
}

impl From<StartCooperateEvent> for StartRequest {
    fn from(event: StartCooperateEvent) -> Self {
        Self {
            event,
            options: None,
        }
    }
}

impl From<StartWithOptionsEvent> for StartRequest {
    fn from(event: StartWithOptionsEvent) -> Self {
        Self {
            event: event.start,
            options: Some(event.options),
        }
    }
}

/// Common tail of every stop in Out and In: tell the peer, answer the
/// stop request if there is one, drop the pairing.
fn stop_cooperation(ctx: &mut Context, request: Option<&StopCooperateEvent>) -> Transition {
    let peer = ctx.peer_or_empty();
    info!(peer = %peer.anonymize(), "stopping cooperation");
    let sent = peer.is_empty() || ctx.send(&peer, PeerMessage::StopCooperate);
    if let Some(request) = request {
        let result = if sent {
            Ok(())
        } else {
            Err(CoordinationErrCode::SendPacketFailed)
        };
        ctx.events.stop_finish(&peer, result);
        if request.is_unchained {
            ctx.transport().close_all_sessions();
            ctx.events.unchain(&peer);
        }
    }
    ctx.reset_cooperation();
    Transition::To(CooperateStatus::Free)
}
