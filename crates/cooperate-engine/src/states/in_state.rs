use cooperate_types::{
    CoordinationErrCode, CooperateEvent, CooperateStatus, HotPlugKind, NetworkId, PeerMessage,
    RemoteStartEvent, UpdateCooperateFlagEvent, COOPERATE_FLAG_FREEZE_CURSOR,
    COOPERATE_FLAG_HIDE_CURSOR,
};
use tracing::{debug, info, trace};

use super::relay::RelayPhase;
use super::{stop_cooperation, StartRequest, Transition};
use crate::context::{Context, Speeds};

/// The peer's input is being received.
///
/// Events go to the initial step unless a relay is waiting for the peer's
/// answer, in which case the relay step sees them first.
#[derive(Debug, Default)]
pub struct InState {
    pub(super) relay: RelayPhase,
}

impl InState {
    pub fn relay(&self) -> &RelayPhase {
        &self.relay
    }

    pub fn on_enter(&mut self, ctx: &mut Context) {
        ctx.set_pointer_visibility(!ctx.need_hide_cursor());
    }

    pub fn on_leave(&mut self, ctx: &mut Context) {
        self.cancel_relay(ctx, CoordinationErrCode::RelayFailed);
        ctx.update_cooperate_flag(&UpdateCooperateFlagEvent {
            mask: COOPERATE_FLAG_HIDE_CURSOR,
            flag: COOPERATE_FLAG_HIDE_CURSOR,
        });
        ctx.remove_virtual_devices();
        ctx.set_pointer_visibility(ctx.has_local_pointer_device());
    }

    pub fn on_event(&mut self, ctx: &mut Context, event: CooperateEvent) -> Transition {
        if self.relay.is_pending() {
            self.on_relay_confirmation(ctx, event)
        } else {
            self.on_initial(ctx, event)
        }
    }

    pub(super) fn on_initial(&mut self, ctx: &mut Context, event: CooperateEvent) -> Transition {
        match event {
            CooperateEvent::Start(ev) => self.on_start(ctx, ev.into()),
            CooperateEvent::StartWithOptions(ev) => self.on_start(ctx, ev.into()),
            CooperateEvent::Stop(ev) => stop_cooperation(ctx, Some(&ev)),
            CooperateEvent::Disable(_) | CooperateEvent::AppClosed(_) => {
                stop_cooperation(ctx, None)
            }
            CooperateEvent::InputPointerEvent(ev) => {
                info!(device = %ev.device_id, "local pointer used, stopping");
                stop_cooperation(ctx, None)
            }
            CooperateEvent::InputDeviceRemoved(ev) => {
                if !ctx.is_virtual_device(ev.device_id) {
                    return Transition::Stay;
                }
                info!(device = %ev.device_id, "virtual device went away, stopping");
                stop_cooperation(ctx, None)
            }
            CooperateEvent::BoardOffline(ev) => Self::stop_if_peer(ctx, &ev.network_id),
            CooperateEvent::SessionClosed(ev) => Self::stop_if_peer(ctx, &ev.network_id),
            CooperateEvent::SwitchChanged(ev) if !ev.normal => {
                Self::stop_if_peer(ctx, &ev.network_id)
            }
            CooperateEvent::RemoteStart(ev) => Self::on_remote_start(ctx, ev),
            CooperateEvent::RemoteStop(ev) => {
                if !ctx.is_peer(&ev.network_id) {
                    debug!(from = %ev.network_id.anonymize(), "remote stop not from peer, ignored");
                    return Transition::Stay;
                }
                info!(peer = %ev.network_id.anonymize(), "peer stopped cooperation");
                ctx.events.remote_stop(&ev.network_id);
                ctx.reset_cooperation();
                Transition::To(CooperateStatus::Free)
            }
            CooperateEvent::UpdateCooperateFlag(ev) => {
                Self::on_update_flag(ctx, &ev);
                Transition::Stay
            }
            CooperateEvent::RemoteInputDeviceSync(ev) => {
                if ctx.is_peer(&ev.network_id) {
                    ctx.remove_virtual_devices();
                    ctx.add_virtual_devices(&ev.devices);
                }
                Transition::Stay
            }
            CooperateEvent::RemoteHotPlug(ev) => {
                if ctx.is_peer(&ev.network_id) {
                    match ev.kind {
                        HotPlugKind::Added => {
                            ctx.add_virtual_devices(std::slice::from_ref(&ev.device));
                        }
                        HotPlugKind::Removed => ctx.remove_virtual_device_by_dhid(&ev.device.dhid),
                    }
                }
                Transition::Stay
            }
            other => {
                trace!(kind = %other.kind(), "ignored while in");
                Transition::Stay
            }
        }
    }

    fn on_start(&mut self, ctx: &mut Context, request: StartRequest) -> Transition {
        let StartRequest { mut event, options } = request;
        if ctx.env().drag.is_motion_dragging() {
            ctx.reject_start(&mut event, CoordinationErrCode::NotAllowedDuringMotionDrag);
            return Transition::Stay;
        }
        if ctx.is_peer(&event.remote_network_id) {
            return Self::come_back(ctx, StartRequest { event, options });
        }
        self.start_relay(ctx, StartRequest { event, options })
    }

    /// Give the input back to the device it came from, over the existing
    /// session.
    fn come_back(ctx: &mut Context, request: StartRequest) -> Transition {
        let StartRequest { mut event, options } = request;
        ctx.accept_start(&mut event);
        let peer = event.remote_network_id.clone();
        info!(peer = %peer.anonymize(), uid = event.uid, "coming back");
        let msg = PeerMessage::ComeBack {
            origin: ctx.local_id().clone(),
            cursor_pos: ctx.normalized_cursor_position(),
            options,
        };
        let result = if ctx.send(&peer, msg) {
            Ok(())
        } else {
            Err(CoordinationErrCode::SendPacketFailed)
        };
        ctx.events.start_finish(&peer, result);
        ctx.reset_cooperation();
        Transition::To(CooperateStatus::Free)
    }

    fn stop_if_peer(ctx: &mut Context, network_id: &NetworkId) -> Transition {
        if !ctx.is_peer(network_id) {
            return Transition::Stay;
        }
        info!(peer = %network_id.anonymize(), "lost peer, stopping");
        stop_cooperation(ctx, None)
    }

    /// A different device takes over: drop the old peer and follow the new
    /// origin.
    fn on_remote_start(ctx: &mut Context, event: RemoteStartEvent) -> Transition {
        let origin = event.origin_network_id;
        if ctx.is_peer(&origin) || ctx.is_local(&origin) {
            debug!(origin = %origin.anonymize(), "remote start from peer or self, ignored");
            return Transition::Stay;
        }
        if let Some(old) = ctx.peer().cloned() {
            info!(old = %old.anonymize(), new = %origin.anonymize(), "switching peer");
            ctx.send(&old, PeerMessage::StopCooperate);
        }
        ctx.remove_virtual_devices();
        ctx.set_peer(origin.clone());
        ctx.store_peer_speeds(Speeds {
            pointer: event.pointer_speed,
            touchpad: event.touchpad_speed,
        });
        ctx.place_cursor_for(event.cursor_pos, event.options.as_ref());
        ctx.send(&origin, PeerMessage::StartCooperateResponse { normal: true });
        ctx.events.remote_start(&origin);
        Transition::Stay
    }

    fn on_update_flag(ctx: &mut Context, event: &UpdateCooperateFlagEvent) {
        let changed = ctx.update_cooperate_flag(event);
        if changed & COOPERATE_FLAG_FREEZE_CURSOR != 0 {
            if ctx.need_freeze_cursor() {
                debug!("freezing cursor");
                ctx.freeze_cursor();
            } else {
                debug!("thawing cursor");
                ctx.thaw_cursor();
            }
        }
        if changed & COOPERATE_FLAG_HIDE_CURSOR != 0 {
            ctx.set_pointer_visibility(!ctx.need_hide_cursor());
        }
    }
}
