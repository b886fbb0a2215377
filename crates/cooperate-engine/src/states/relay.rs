//! Relay handoff while In: hand the peer's input on to a third device.
//!
//! The phase starts when a local start names a device other than the peer.
//! The peer is asked to connect to the target directly and one timeout
//! timer is armed; whichever of the answer or the timeout arrives first
//! settles the relay, the other finds the phase idle and is dropped.
//! Results carry the relay's uid and target, so a late result from an
//! earlier relay never settles a newer one.

use cooperate_adapters::{TimerError, TimerId};
use cooperate_types::{
    CoordinationErrCode, CooperateEvent, CooperateOptions, CooperateStatus, DeviceId, NetworkId,
    PeerMessage, RelayCooperateFinishedEvent, RemoteStartEvent,
};
use tracing::{debug, info, warn};

use super::in_state::InState;
use super::{stop_cooperation, StartRequest, Transition};
use crate::context::Context;

/// A relay waiting for the peer's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRelay {
    pub timer: TimerId,
    pub target: NetworkId,
    pub start_device_id: DeviceId,
    pub uid: u32,
    pub options: Option<CooperateOptions>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum RelayPhase {
    #[default]
    Idle,
    AwaitingResponse(PendingRelay),
}

impl RelayPhase {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingResponse(_))
    }

    pub fn pending(&self) -> Option<&PendingRelay> {
        match self {
            Self::AwaitingResponse(relay) => Some(relay),
            Self::Idle => None,
        }
    }

    /// Leave the phase, cancelling its timer.
    pub fn take(&mut self, ctx: &Context) -> Option<PendingRelay> {
        match std::mem::take(self) {
            Self::AwaitingResponse(relay) => {
                ctx.cancel_timer(relay.timer);
                Some(relay)
            }
            Self::Idle => None,
        }
    }
}

impl std::fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingResponse(relay) => write!(
                f,
                "awaiting response (target {}, timer {}, uid {})",
                relay.target.anonymize(),
                relay.timer,
                relay.uid
            ),
        }
    }
}

/// Arm the timeout that settles a relay as failed when the peer stays
/// silent.
fn arm_timeout(
    ctx: &Context,
    peer: NetworkId,
    target: NetworkId,
    uid: u32,
) -> Result<TimerId, TimerError> {
    let timeout = ctx.timing().relay_timeout();
    ctx.schedule(timeout, move || {
        CooperateEvent::RelayCooperateFinished(RelayCooperateFinishedEvent {
            network_id: peer.clone(),
            target_network_id: target.clone(),
            normal: false,
            uid,
        })
    })
}

impl InState {
    /// Open a session to the target, ask the peer to relay, arm the
    /// timeout. Stays in the initial step when any of it fails.
    pub(super) fn start_relay(&mut self, ctx: &mut Context, request: StartRequest) -> Transition {
        let StartRequest { mut event, options } = request;
        ctx.accept_start(&mut event);
        let target = event.remote_network_id.clone();
        let peer = ctx.peer_or_empty();
        info!(
            peer = %peer.anonymize(),
            target = %target.anonymize(),
            uid = event.uid,
            "relaying cooperation"
        );

        if ctx.transport().open_session(&target).is_err() {
            ctx.events
                .start_finish(&target, Err(CoordinationErrCode::OpenSessionFailed));
            return Transition::Stay;
        }

        let timer = match arm_timeout(ctx, peer.clone(), target.clone(), event.uid) {
            Ok(timer) => timer,
            Err(e) => {
                warn!(error = %e, "cannot arm relay timeout");
                ctx.events
                    .start_finish(&target, Err(CoordinationErrCode::RelayFailed));
                return Transition::Stay;
            }
        };

        let speeds = ctx.peer_speeds().unwrap_or_else(|| ctx.local_speeds());
        let msg = PeerMessage::RelayCooperate {
            target: target.clone(),
            pointer_speed: speeds.pointer,
            touchpad_speed: speeds.touchpad,
            uid: event.uid,
        };
        if !ctx.send(&peer, msg) {
            ctx.cancel_timer(timer);
            ctx.events
                .start_finish(&target, Err(CoordinationErrCode::SendPacketFailed));
            return Transition::Stay;
        }

        self.relay = RelayPhase::AwaitingResponse(PendingRelay {
            timer,
            target,
            start_device_id: event.start_device_id,
            uid: event.uid,
            options,
        });
        Transition::Stay
    }

    /// Cancel a pending relay and report `code` for it.
    pub fn cancel_relay(&mut self, ctx: &mut Context, code: CoordinationErrCode) {
        if let Some(relay) = self.relay.take(ctx) {
            info!(target = %relay.target.anonymize(), uid = relay.uid, %code, "relay cancelled");
            ctx.events.start_finish(&relay.target, Err(code));
        }
    }

    /// Handling while a relay waits for the peer's answer.
    pub(super) fn on_relay_confirmation(
        &mut self,
        ctx: &mut Context,
        event: CooperateEvent,
    ) -> Transition {
        match event {
            CooperateEvent::RelayCooperateFinished(ev) => self.on_relay_finished(ctx, &ev),
            CooperateEvent::Start(ev) => Self::reject_nested(ev.into()),
            CooperateEvent::StartWithOptions(ev) => Self::reject_nested(ev.into()),
            CooperateEvent::Stop(ev) => {
                self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
                stop_cooperation(ctx, Some(&ev))
            }
            CooperateEvent::Disable(_)
            | CooperateEvent::AppClosed(_)
            | CooperateEvent::InputPointerEvent(_) => {
                self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
                stop_cooperation(ctx, None)
            }
            CooperateEvent::InputDeviceRemoved(ev) if ctx.is_virtual_device(ev.device_id) => {
                self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
                stop_cooperation(ctx, None)
            }
            CooperateEvent::BoardOffline(ev) => self.on_relay_endpoint_lost(ctx, &ev.network_id),
            CooperateEvent::SessionClosed(ev) => self.on_relay_endpoint_lost(ctx, &ev.network_id),
            CooperateEvent::SwitchChanged(ev) if !ev.normal => {
                self.on_relay_endpoint_lost(ctx, &ev.network_id)
            }
            CooperateEvent::RemoteStop(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    debug!(from = %ev.network_id.anonymize(), "remote stop not from peer, ignored");
                    return Transition::Stay;
                }
                // Settle the relay first, then let the initial step stop.
                Self::requeue(ctx, CooperateEvent::RemoteStop(ev));
                self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
                Transition::Stay
            }
            CooperateEvent::RemoteStart(ev) => self.on_remote_start_while_relaying(ctx, ev),
            other => self.on_initial(ctx, other),
        }
    }

    fn on_relay_finished(
        &mut self,
        ctx: &mut Context,
        event: &RelayCooperateFinishedEvent,
    ) -> Transition {
        if !ctx.is_peer(&event.network_id) {
            debug!(from = %event.network_id.anonymize(), "relay result not from peer, ignored");
            return Transition::Stay;
        }
        let current = self.relay.pending().is_some_and(|relay| {
            relay.uid == event.uid && relay.target == event.target_network_id
        });
        if !current {
            debug!(
                target = %event.target_network_id.anonymize(),
                uid = event.uid,
                "relay result for another relay, dropped"
            );
            return Transition::Stay;
        }
        let Some(relay) = self.relay.take(ctx) else {
            return Transition::Stay;
        };
        let peer = ctx.peer_or_empty();

        if !event.normal {
            info!(target = %relay.target.anonymize(), uid = relay.uid, "relay failed");
            ctx.events
                .start_finish(&relay.target, Err(CoordinationErrCode::RelayFailed));
            return stop_cooperation(ctx, None);
        }

        let speeds = ctx.peer_speeds().unwrap_or_else(|| ctx.local_speeds());
        let msg = PeerMessage::StartCooperate {
            origin: peer.clone(),
            cursor_pos: ctx.normalized_cursor_position(),
            pointer_speed: speeds.pointer,
            touchpad_speed: speeds.touchpad,
            uid: relay.uid,
            options: relay.options,
        };
        let result = if ctx.send(&relay.target, msg) {
            Ok(())
        } else {
            Err(CoordinationErrCode::SendPacketFailed)
        };
        info!(
            origin = %peer.anonymize(),
            target = %relay.target.anonymize(),
            uid = relay.uid,
            ok = result.is_ok(),
            "relay finished"
        );
        ctx.events.start_finish(&relay.target, result);
        ctx.events.relay(&relay.target);
        ctx.reset_cooperation();
        Transition::To(CooperateStatus::Free)
    }

    fn on_relay_endpoint_lost(&mut self, ctx: &mut Context, network_id: &NetworkId) -> Transition {
        let is_target = self
            .relay
            .pending()
            .is_some_and(|relay| relay.target == *network_id);
        let is_peer = ctx.is_peer(network_id);
        if !is_peer && !is_target {
            return Transition::Stay;
        }
        info!(
            device = %network_id.anonymize(),
            is_peer,
            "relay endpoint lost"
        );
        self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
        if is_peer {
            stop_cooperation(ctx, None)
        } else {
            Transition::Stay
        }
    }

    fn on_remote_start_while_relaying(
        &mut self,
        ctx: &mut Context,
        event: RemoteStartEvent,
    ) -> Transition {
        let origin = &event.origin_network_id;
        if ctx.is_peer(origin) || ctx.is_local(origin) {
            debug!(origin = %origin.anonymize(), "remote start from peer or self, ignored");
            return Transition::Stay;
        }
        let from_target = self
            .relay
            .pending()
            .is_some_and(|relay| relay.target == *origin);
        if from_target {
            info!(origin = %origin.anonymize(), "relay target started towards us");
            Self::requeue(ctx, CooperateEvent::RemoteStart(event));
            self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
            return Transition::Stay;
        }

        let cooling = ctx.timing().cooling_time();
        debug!(
            origin = %origin.anonymize(),
            delay_ms = cooling.as_millis(),
            "remote start during relay, deferred"
        );
        let deferred = event.clone();
        if let Err(e) = ctx.defer(cooling, move || CooperateEvent::RemoteStart(deferred.clone())) {
            warn!(error = %e, "cannot defer remote start, handling now");
            return self.on_initial(ctx, CooperateEvent::RemoteStart(event));
        }
        Transition::Stay
    }

    /// The relayed start still owns the busy flag, so only the sink is
    /// answered.
    fn reject_nested(request: StartRequest) -> Transition {
        let mut event = request.event;
        debug!(peer = %event.remote_network_id.anonymize(), "start during relay rejected");
        event.error_sink.complete(Err(CoordinationErrCode::Busy));
        Transition::Stay
    }

    fn requeue(ctx: &Context, event: CooperateEvent) {
        let kind = event.kind();
        if let Err(e) = ctx.sender().send(event) {
            warn!(%kind, error = %e, "failed to requeue event");
        }
    }
}
