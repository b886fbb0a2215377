use cooperate_types::{
    ComeBackEvent, CoordinationErrCode, CooperateEvent, CooperateStatus, PeerMessage,
    RelayCooperateEvent,
};
use tracing::{debug, info, trace};

use super::{stop_cooperation, StartRequest, Transition};
use crate::context::Context;

/// Local input is being sent to the peer.
#[derive(Debug, Default)]
pub struct OutState;

impl OutState {
    pub fn on_event(&mut self, ctx: &mut Context, event: CooperateEvent) -> Transition {
        match event {
            CooperateEvent::Start(ev) => Self::on_start(ctx, ev.into()),
            CooperateEvent::StartWithOptions(ev) => Self::on_start(ctx, ev.into()),
            CooperateEvent::Stop(ev) => stop_cooperation(ctx, Some(&ev)),
            CooperateEvent::Disable(_) => stop_cooperation(ctx, None),
            CooperateEvent::AppClosed(_) => {
                ctx.transport().close_all_sessions();
                stop_cooperation(ctx, None)
            }
            CooperateEvent::RemoteStop(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    return Self::ignore("remote stop", &ev.network_id);
                }
                info!(peer = %ev.network_id.anonymize(), "peer stopped cooperation");
                ctx.events.remote_stop(&ev.network_id);
                Self::reset(ctx)
            }
            CooperateEvent::ComeBack(ev) => Self::on_come_back(ctx, &ev),
            CooperateEvent::RelayCooperate(ev) => {
                Self::on_relay(ctx, &ev);
                Transition::Stay
            }
            CooperateEvent::RemoteStartResponse(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    return Self::ignore("start response", &ev.network_id);
                }
                if ev.normal {
                    debug!(peer = %ev.network_id.anonymize(), "peer confirmed start");
                    Transition::Stay
                } else {
                    info!(peer = %ev.network_id.anonymize(), "peer refused start");
                    Self::reset(ctx)
                }
            }
            CooperateEvent::InputPointerEvent(ev) => {
                if ev.device_id == ctx.start_device_id() {
                    return Transition::Stay;
                }
                info!(device = %ev.device_id, "another local mouse moved, stopping");
                stop_cooperation(ctx, None)
            }
            CooperateEvent::BoardOffline(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    return Self::ignore("board offline", &ev.network_id);
                }
                info!(peer = %ev.network_id.anonymize(), "peer went offline");
                Self::reset(ctx)
            }
            CooperateEvent::SessionClosed(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    return Self::ignore("session closed", &ev.network_id);
                }
                info!(peer = %ev.network_id.anonymize(), "session with peer closed");
                Self::reset(ctx)
            }
            CooperateEvent::SwitchChanged(ev) => {
                if ev.normal || !ctx.is_peer(&ev.network_id) {
                    return Self::ignore("switch changed", &ev.network_id);
                }
                info!(peer = %ev.network_id.anonymize(), "peer switched cooperation off");
                stop_cooperation(ctx, None)
            }
            CooperateEvent::UpdateCooperateFlag(ev) => {
                ctx.update_cooperate_flag(&ev);
                Transition::Stay
            }
            other => {
                trace!(kind = %other.kind(), "ignored while out");
                Transition::Stay
            }
        }
    }

    fn on_start(ctx: &mut Context, request: StartRequest) -> Transition {
        let mut event = request.event;
        ctx.reject_start(&mut event, CoordinationErrCode::AlreadyCooperating);
        Transition::Stay
    }

    fn on_come_back(ctx: &mut Context, event: &ComeBackEvent) -> Transition {
        if !ctx.is_peer(&event.network_id) {
            return Self::ignore("come back", &event.network_id);
        }
        info!(peer = %event.network_id.anonymize(), "input came back");
        ctx.place_cursor_for(event.cursor_pos, event.options.as_ref());
        ctx.events.come_back(&event.network_id);
        Self::reset(ctx)
    }

    /// The peer hands our input on to `target`: connect to it directly
    /// and report the outcome.
    fn on_relay(ctx: &mut Context, event: &RelayCooperateEvent) {
        if !ctx.is_peer(&event.network_id) {
            Self::ignore("relay", &event.network_id);
            return;
        }
        let target = &event.target_network_id;
        let normal = ctx.transport().open_session(target).is_ok();
        info!(
            peer = %event.network_id.anonymize(),
            target = %target.anonymize(),
            uid = event.uid,
            normal,
            "relay requested"
        );
        let sent = ctx.send(
            &event.network_id,
            PeerMessage::RelayCooperateFinished {
                target: target.clone(),
                normal,
                uid: event.uid,
            },
        );
        if normal && sent {
            ctx.set_peer(target.clone());
            ctx.events.relay(target);
        }
    }

    fn reset(ctx: &mut Context) -> Transition {
        ctx.reset_cooperation();
        Transition::To(CooperateStatus::Free)
    }

    fn ignore(what: &str, from: &cooperate_types::NetworkId) -> Transition {
        debug!(from = %from.anonymize(), what, "not from peer, ignored");
        Transition::Stay
    }
}
