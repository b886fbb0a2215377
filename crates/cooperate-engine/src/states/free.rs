use cooperate_types::{
    CoordinationErrCode, CooperateEvent, CooperateStatus, PeerMessage, RemoteStartEvent,
    StopCooperateEvent,
};
use tracing::{debug, info, trace};

use super::{StartRequest, Transition};
use crate::context::{Context, Speeds};

/// Idle: no pairing.
#[derive(Debug, Default)]
pub struct FreeState;

impl FreeState {
    pub fn on_event(&mut self, ctx: &mut Context, event: CooperateEvent) -> Transition {
        match event {
            CooperateEvent::Start(ev) => Self::on_start(ctx, ev.into()),
            CooperateEvent::StartWithOptions(ev) => Self::on_start(ctx, ev.into()),
            CooperateEvent::Stop(ev) => {
                Self::on_stop(ctx, &ev);
                Transition::Stay
            }
            CooperateEvent::Disable(_) | CooperateEvent::AppClosed(_) => {
                ctx.transport().close_all_sessions();
                Transition::Stay
            }
            CooperateEvent::RemoteStart(ev) => Self::on_remote_start(ctx, ev),
            other => {
                trace!(kind = %other.kind(), "ignored while free");
                Transition::Stay
            }
        }
    }

    fn on_start(ctx: &mut Context, request: StartRequest) -> Transition {
        let StartRequest { mut event, options } = request;
        ctx.accept_start(&mut event);
        let target = event.remote_network_id.clone();
        info!(peer = %target.anonymize(), uid = event.uid, "starting cooperation");

        if ctx.transport().open_session(&target).is_err() {
            ctx.events
                .start_finish(&target, Err(CoordinationErrCode::OpenSessionFailed));
            return Transition::Stay;
        }

        let speeds = ctx.local_speeds();
        let msg = PeerMessage::StartCooperate {
            origin: ctx.local_id().clone(),
            cursor_pos: ctx.normalized_cursor_position(),
            pointer_speed: speeds.pointer,
            touchpad_speed: speeds.touchpad,
            uid: event.uid,
            options,
        };
        if !ctx.send(&target, msg) {
            ctx.events
                .start_finish(&target, Err(CoordinationErrCode::SendPacketFailed));
            return Transition::Stay;
        }

        ctx.set_peer(target.clone());
        ctx.set_start_device_id(event.start_device_id);
        ctx.events.start_finish(&target, Ok(()));
        Transition::To(CooperateStatus::Out)
    }

    fn on_stop(ctx: &mut Context, event: &StopCooperateEvent) {
        let peer = ctx.peer_or_empty();
        ctx.events.stop_finish(&peer, Ok(()));
        if event.is_unchained {
            ctx.transport().close_all_sessions();
            ctx.events.unchain(&peer);
        }
    }

    fn on_remote_start(ctx: &mut Context, event: RemoteStartEvent) -> Transition {
        if ctx.is_local(&event.origin_network_id) || ctx.is_local(&event.network_id) {
            debug!("ignoring remote start from self");
            return Transition::Stay;
        }
        let origin = event.origin_network_id;
        info!(
            origin = %origin.anonymize(),
            sender = %event.network_id.anonymize(),
            uid = event.uid,
            "remote start"
        );
        ctx.set_peer(origin.clone());
        ctx.store_peer_speeds(Speeds {
            pointer: event.pointer_speed,
            touchpad: event.touchpad_speed,
        });
        ctx.place_cursor_for(event.cursor_pos, event.options.as_ref());
        ctx.send(&origin, PeerMessage::StartCooperateResponse { normal: true });
        ctx.events.remote_start(&origin);
        Transition::To(CooperateStatus::In)
    }
}
