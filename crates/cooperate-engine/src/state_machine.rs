//! Top-level dispatcher.
//!
//! Handles the events that concern the whole engine (listeners, client
//! lifecycle, start validation, online peers, hot areas, mouse location
//! sharing, shutdown) and forwards the rest to the current state. Only [`StateMachine::transition_to`] changes
//! the current state.

use std::collections::BTreeSet;

use cooperate_types::{
    BoardOfflineEvent, BoardOnlineEvent, CoordinationErrCode, CooperateEvent, CooperateStatus,
    GetCooperateStateEvent, InputPointerEvent, NetworkId, SourceType, StartCooperateEvent,
};
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use crate::context::Context;
use crate::event_manager::{CallKind, PendingRequest};
use crate::states::{RelayPhase, State, Transition};

pub struct StateMachine {
    current: State,
    online: BTreeSet<NetworkId>,
    status_tx: watch::Sender<CooperateStatus>,
    transitions: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(CooperateStatus::Free);
        Self {
            current: State::new(CooperateStatus::Free),
            online: BTreeSet::new(),
            status_tx,
            transitions: 0,
        }
    }

    #[must_use]
    pub fn status(&self) -> CooperateStatus {
        self.current.status()
    }

    /// Watch channel that sees every published status.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<CooperateStatus> {
        self.status_tx.subscribe()
    }

    pub fn online_peers(&self) -> impl Iterator<Item = &NetworkId> {
        self.online.iter()
    }

    #[must_use]
    pub fn relay_phase(&self) -> Option<&RelayPhase> {
        self.current.relay_phase()
    }

    /// Number of state changes since startup.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn on_event(&mut self, ctx: &mut Context, event: CooperateEvent) {
        trace!(kind = %event.kind(), state = %self.status(), "event");
        match event {
            CooperateEvent::RegisterListener(ev) => ctx.events.add_listener(ev.pid),
            CooperateEvent::UnregisterListener(ev) => ctx.events.remove_listener(ev.pid),
            CooperateEvent::RegisterHotAreaListener(ev) => ctx.hot_area.add_listener(ev.pid),
            CooperateEvent::UnregisterHotAreaListener(ev) => ctx.hot_area.remove_listener(ev.pid),
            CooperateEvent::RegisterEventListener(ev) => {
                ctx.mouse_location.add_listener(ev.pid, &ev.network_id);
            }
            CooperateEvent::UnregisterEventListener(ev) => {
                ctx.mouse_location.remove_listener(ev.pid, &ev.network_id);
            }
            CooperateEvent::SubscribeMouseLocation(ev) => {
                ctx.mouse_location.on_subscribe(&ev.network_id);
            }
            CooperateEvent::UnsubscribeMouseLocation(ev) => {
                ctx.mouse_location.on_unsubscribe(&ev.network_id);
            }
            CooperateEvent::ReplySubscribeMouseLocation(ev) => {
                ctx.mouse_location.on_reply_subscribe(&ev);
            }
            CooperateEvent::ReplyUnsubscribeMouseLocation(ev) => {
                ctx.mouse_location.on_reply_unsubscribe(&ev);
            }
            CooperateEvent::RemoteMouseLocation(ev) => ctx.mouse_location.on_remote_location(&ev),
            CooperateEvent::Enable(ev) => {
                info!(pid = %ev.pid, "cooperation enabled");
                ctx.observe_client(ev.pid);
                ctx.add_monitors();
                ctx.events.enable(ev.pid, ctx.local_id());
                let display = ctx.env().input.display_size();
                let cursor = ctx.env().input.cursor_position();
                ctx.hot_area.enable(display, cursor);
                self.transfer(ctx, CooperateEvent::Enable(ev));
            }
            CooperateEvent::Disable(ev) => {
                info!(pid = %ev.pid, "cooperation disabled");
                ctx.forget_client(ev.pid);
                if !ctx.has_clients() {
                    ctx.remove_monitors();
                }
                ctx.events.disable(ev.pid, ctx.local_id());
                self.transfer(ctx, CooperateEvent::Disable(ev));
            }
            CooperateEvent::AppClosed(ev) => {
                info!(pid = %ev.pid, "client closed");
                ctx.forget_client(ev.pid);
                ctx.events.remove_listener(ev.pid);
                ctx.hot_area.remove_listener(ev.pid);
                ctx.mouse_location.remove_client(ev.pid);
                if !ctx.has_clients() {
                    ctx.remove_monitors();
                }
                self.transfer(ctx, CooperateEvent::AppClosed(ev));
            }
            CooperateEvent::Start(mut ev) => {
                if Self::validate_start(ctx, &mut ev) {
                    self.transfer(ctx, CooperateEvent::Start(ev));
                }
            }
            CooperateEvent::StartWithOptions(mut ev) => {
                if Self::validate_start(ctx, &mut ev.start) {
                    self.transfer(ctx, CooperateEvent::StartWithOptions(ev));
                }
            }
            CooperateEvent::Stop(ev) => {
                ctx.events.stop_cooperate(PendingRequest {
                    pid: ev.pid,
                    user_data: ev.user_data,
                    network_id: ctx.peer_or_empty(),
                });
                self.transfer(ctx, CooperateEvent::Stop(ev));
            }
            CooperateEvent::GetCooperateState(ev) => self.on_get_state(ctx, ev),
            CooperateEvent::InputPointerEvent(ev) => {
                if Self::is_local_mouse_activity(ctx, &ev) {
                    ctx.on_pointer_event(&ev);
                    let location = ctx.locate_cursor(ev.position);
                    ctx.mouse_location.on_local_pointer(location);
                    if self.status() == CooperateStatus::Free {
                        ctx.hot_area.on_pointer(ev.position);
                    }
                    self.transfer(ctx, CooperateEvent::InputPointerEvent(ev));
                }
            }
            CooperateEvent::BoardOnline(ev) => self.on_board_online(ctx, ev),
            CooperateEvent::BoardOffline(ev) => self.on_board_offline(ctx, ev),
            CooperateEvent::SwitchChanged(ev) => {
                ctx.events.profile_changed(&ev.network_id, ev.normal);
                self.transfer(ctx, CooperateEvent::SwitchChanged(ev));
            }
            CooperateEvent::SessionOpened(ev) => {
                debug!(peer = %ev.network_id.anonymize(), "session opened");
                self.transfer(ctx, CooperateEvent::SessionOpened(ev));
            }
            CooperateEvent::SessionClosed(ev) => {
                info!(peer = %ev.network_id.anonymize(), "session closed");
                ctx.events.session_closed(&ev.network_id);
                ctx.mouse_location.on_session_closed(&ev.network_id);
                self.transfer(ctx, CooperateEvent::SessionClosed(ev));
            }
            CooperateEvent::Quit => self.on_quit(ctx),
            other => self.transfer(ctx, other),
        }
    }

    fn transfer(&mut self, ctx: &mut Context, event: CooperateEvent) {
        if let Transition::To(next) = self.current.on_event(ctx, event) {
            self.transition_to(ctx, next);
        }
    }

    /// Swap the current state, running the leave/enter hooks and
    /// publishing the new status.
    fn transition_to(&mut self, ctx: &mut Context, next: CooperateStatus) {
        let current = self.status();
        if current == next {
            return;
        }
        let legal = is_legal(current, next);
        debug_assert!(legal, "illegal transition {current} -> {next}");
        if !legal {
            error!(from = %current, to = %next, "illegal transition refused");
            return;
        }
        self.current.on_leave(ctx);
        self.current = State::new(next);
        self.current.on_enter(ctx);
        self.transitions += 1;
        info!(from = %current, to = %next, "cooperate state changed");
        ctx.events.state_changed(next);
        self.status_tx.send_replace(next);
    }

    /// Reject starts that can never succeed. Failures complete the sink
    /// and end handling.
    fn validate_start(ctx: &mut Context, event: &mut StartCooperateEvent) -> bool {
        let peer = &event.remote_network_id;
        let code = if ctx.is_local(peer) {
            CoordinationErrCode::UnexpectedStartCall
        } else if !ctx.env().policy.check_same_account(peer) {
            CoordinationErrCode::NotTrusted
        } else if !ctx.env().policy.is_allowed(peer) {
            CoordinationErrCode::NotAllowed
        } else if ctx.events.pending(CallKind::Start).is_some() {
            // The pending request still owns the busy flag.
            debug!(peer = %peer.anonymize(), "start already pending");
            event.error_sink.complete(Err(CoordinationErrCode::Busy));
            return false;
        } else {
            return true;
        };
        ctx.reject_start(event, code);
        false
    }

    fn is_local_mouse_activity(ctx: &Context, event: &InputPointerEvent) -> bool {
        event.source_type == SourceType::Mouse
            && !event.pointer_action.is_window_transition()
            && event.device_id.is_valid()
            && !ctx.is_virtual_device(event.device_id)
    }

    fn on_get_state(&self, ctx: &Context, event: GetCooperateStateEvent) {
        let cooperating = self.status() != CooperateStatus::Free
            && (event.network_id.is_empty() || ctx.is_peer(&event.network_id));
        if let Some(reply) = event.reply {
            // The caller may have stopped waiting.
            let _ = reply.send(cooperating);
        }
        ctx.events
            .reply_state(event.pid, event.user_data, &event.network_id, cooperating);
    }

    fn on_board_online(&mut self, ctx: &mut Context, event: BoardOnlineEvent) {
        if !self.online.insert(event.network_id.clone()) {
            return;
        }
        info!(peer = %event.network_id.anonymize(), "board online");
        ctx.env().profile.add_watch(&event.network_id);
        self.transfer(ctx, CooperateEvent::BoardOnline(event));
    }

    fn on_board_offline(&mut self, ctx: &mut Context, event: BoardOfflineEvent) {
        if !self.online.remove(&event.network_id) {
            return;
        }
        info!(peer = %event.network_id.anonymize(), "board offline");
        ctx.env().profile.remove_watch(&event.network_id);
        self.transfer(ctx, CooperateEvent::BoardOffline(event));
    }

    fn on_quit(&mut self, ctx: &mut Context) {
        info!(state = %self.status(), "engine quitting");
        for peer in std::mem::take(&mut self.online) {
            ctx.env().profile.remove_watch(&peer);
        }
        ctx.remove_monitors();
        ctx.forget_all_clients();
        self.current.cancel_timers(ctx);
        ctx.cancel_deferred_timers();
    }
}

fn is_legal(from: CooperateStatus, to: CooperateStatus) -> bool {
    matches!(
        (from, to),
        (CooperateStatus::Free, CooperateStatus::In | CooperateStatus::Out)
            | (CooperateStatus::In | CooperateStatus::Out, CooperateStatus::Free)
    )
}

#[cfg(test)]
mod tests {
    use cooperate_types::{
        AppClosedEvent, Coordinate, CoordinationMessage, CooperateOptions, DeviceId,
        DisableCooperateEvent, DisplayGeometry, EnableCooperateEvent, HotArea, MouseLocation,
        MouseLocationReplyEvent, MouseLocationSubscriptionEvent, Notification, PeerMessage, Pid,
        PointerAction, RegisterEventListenerEvent, RegisterHotAreaListenerEvent,
        RegisterListenerEvent, RemoteMouseLocationEvent, RemoteStopEvent, SessionClosedEvent,
        StartWithOptionsEvent, UnregisterHotAreaListenerEvent,
    };
    use tokio::sync::oneshot;

    use super::*;
    use crate::testing::{context, remote_start, start, stop, CLIENT};

    fn enable(pid: i32) -> CooperateEvent {
        CooperateEvent::Enable(EnableCooperateEvent {
            pid: Pid(pid),
            user_data: 0,
            token_id: 0,
        })
    }

    fn pointer(device: i32, source_type: SourceType, action: PointerAction) -> CooperateEvent {
        CooperateEvent::InputPointerEvent(InputPointerEvent {
            device_id: DeviceId(device),
            pointer_action: action,
            source_type,
            position: Coordinate::new(10, 10),
        })
    }

    fn online(peer: &str) -> CooperateEvent {
        CooperateEvent::BoardOnline(BoardOnlineEvent {
            network_id: NetworkId::from(peer),
        })
    }

    fn offline(peer: &str) -> CooperateEvent {
        CooperateEvent::BoardOffline(BoardOfflineEvent {
            network_id: NetworkId::from(peer),
        })
    }

    fn get_state(peer: &str) -> (CooperateEvent, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let event = CooperateEvent::GetCooperateState(GetCooperateStateEvent {
            pid: CLIENT,
            user_data: 4,
            network_id: NetworkId::from(peer),
            reply: Some(tx),
        });
        (event, rx)
    }

    fn out_with(ctx: &mut Context, machine: &mut StateMachine, peer: &str) {
        assert!(ctx.events.busy().try_begin_start());
        let (event, _) = start(peer, 3);
        machine.on_event(ctx, CooperateEvent::Start(event));
        assert_eq!(machine.status(), CooperateStatus::Out);
    }

    #[test]
    fn start_validation_rejects_without_traffic() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        mocks.policy.distrust("B");
        mocks.policy.deny("C");

        for (peer, code) in [
            ("A", CoordinationErrCode::UnexpectedStartCall),
            ("B", CoordinationErrCode::NotTrusted),
            ("C", CoordinationErrCode::NotAllowed),
        ] {
            assert!(ctx.events.busy().try_begin_start());
            let (event, mut sink) = start(peer, 3);
            machine.on_event(&mut ctx, CooperateEvent::Start(event));
            assert_eq!(sink.try_recv().unwrap(), Err(code));
            assert!(!ctx.events.busy().is_starting());
        }
        assert_eq!(machine.status(), CooperateStatus::Free);
        assert!(mocks.transport.opened().is_empty());
        assert!(mocks.notifier.start_results().is_empty());
    }

    #[test]
    fn start_with_options_goes_out_and_publishes_status() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        let status = machine.status_receiver();
        machine.on_event(
            &mut ctx,
            CooperateEvent::RegisterListener(RegisterListenerEvent { pid: Pid(5) }),
        );

        let (event, mut sink) = start("B", 3);
        let options = CooperateOptions {
            display_x: 10,
            display_y: 20,
            display_id: 0,
        };
        machine.on_event(
            &mut ctx,
            CooperateEvent::StartWithOptions(StartWithOptionsEvent {
                start: event,
                options,
            }),
        );

        assert_eq!(sink.try_recv().unwrap(), Ok(()));
        assert_eq!(machine.status(), CooperateStatus::Out);
        assert_eq!(*status.borrow(), CooperateStatus::Out);
        assert_eq!(machine.transitions(), 1);
        assert!(mocks
            .notifier
            .for_pid(Pid(5))
            .contains(&Notification::StateChanged {
                status: CooperateStatus::Out
            }));
        assert!(matches!(
            mocks.transport.sent_to("B").as_slice(),
            [PeerMessage::StartCooperate { options: Some(o), .. }] if *o == options
        ));
    }

    #[test]
    fn second_start_while_pending_is_busy() {
        let (mut ctx, _mocks, _) = context("A");
        let mut machine = StateMachine::new();
        ctx.events.start_cooperate(PendingRequest {
            pid: CLIENT,
            user_data: 1,
            network_id: NetworkId::from("B"),
        });
        assert!(ctx.events.busy().try_begin_start());

        let (event, mut sink) = start("C", 3);
        machine.on_event(&mut ctx, CooperateEvent::Start(event));

        assert_eq!(sink.try_recv().unwrap(), Err(CoordinationErrCode::Busy));
        assert!(ctx.events.busy().is_starting());
    }

    #[test]
    fn enable_installs_monitors_once_and_disable_removes() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        machine.on_event(&mut ctx, enable(100));
        machine.on_event(&mut ctx, enable(101));
        assert_eq!(mocks.input.monitor_count(), 1);
        assert_eq!(mocks.input.device_listener_count(), 1);
        assert!(mocks.sessions.observed(Pid(100)));
        assert!(matches!(
            mocks.notifier.for_pid(Pid(100)).as_slice(),
            [Notification::Message { msg: CoordinationMessage::PrepareSuccess, .. }]
        ));

        let disable = |pid| {
            CooperateEvent::Disable(DisableCooperateEvent {
                pid: Pid(pid),
                user_data: 0,
            })
        };
        machine.on_event(&mut ctx, disable(100));
        assert_eq!(mocks.input.monitor_count(), 1);
        machine.on_event(&mut ctx, disable(101));
        assert_eq!(mocks.input.monitor_count(), 0);
        assert!(!mocks.sessions.observed(Pid(101)));
    }

    #[test]
    fn board_offline_transfers_only_on_change() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        out_with(&mut ctx, &mut machine, "B");

        // Never reported online, so nothing changes.
        machine.on_event(&mut ctx, offline("B"));
        assert_eq!(machine.status(), CooperateStatus::Out);

        machine.on_event(&mut ctx, online("B"));
        machine.on_event(&mut ctx, online("B"));
        assert!(mocks.profile.watches().contains(&NetworkId::from("B")));
        assert_eq!(machine.online_peers().count(), 1);

        machine.on_event(&mut ctx, offline("B"));
        assert_eq!(machine.status(), CooperateStatus::Free);
        assert!(mocks.profile.watches().is_empty());
    }

    #[test]
    fn pointer_events_are_filtered_before_states() {
        let (mut ctx, _mocks, _) = context("A");
        let mut machine = StateMachine::new();
        out_with(&mut ctx, &mut machine, "B");

        machine.on_event(&mut ctx, pointer(5, SourceType::Touchpad, PointerAction::Move));
        machine.on_event(&mut ctx, pointer(5, SourceType::Mouse, PointerAction::PullOut));
        machine.on_event(&mut ctx, pointer(-1, SourceType::Mouse, PointerAction::Move));
        machine.on_event(&mut ctx, pointer(3, SourceType::Mouse, PointerAction::Move));
        assert_eq!(machine.status(), CooperateStatus::Out);
        assert!(ctx.last_pointer().is_some());

        machine.on_event(&mut ctx, pointer(5, SourceType::Mouse, PointerAction::Move));
        assert_eq!(machine.status(), CooperateStatus::Free);
    }

    #[test]
    fn get_state_replies_on_sink_and_notifier() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();

        let (event, mut reply) = get_state("");
        machine.on_event(&mut ctx, event);
        assert_eq!(reply.try_recv(), Ok(false));

        out_with(&mut ctx, &mut machine, "B");
        let (event, mut reply) = get_state("B");
        machine.on_event(&mut ctx, event);
        assert_eq!(reply.try_recv(), Ok(true));
        let (event, mut reply) = get_state("C");
        machine.on_event(&mut ctx, event);
        assert_eq!(reply.try_recv(), Ok(false));

        assert_eq!(
            mocks
                .notifier
                .for_pid(CLIENT)
                .iter()
                .filter(|n| matches!(n, Notification::State { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn stop_registers_pending_request() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        out_with(&mut ctx, &mut machine, "B");

        machine.on_event(&mut ctx, stop(false));
        assert_eq!(machine.status(), CooperateStatus::Free);
        assert_eq!(
            mocks.notifier.stop_results(),
            vec![Notification::StopResult {
                user_data: 2,
                network_id: NetworkId::from("B"),
                result: Ok(()),
            }]
        );
    }

    #[test]
    fn remote_stop_from_stranger_is_ignored() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        out_with(&mut ctx, &mut machine, "B");
        let sent = mocks.transport.sent();
        let notified = mocks.notifier.all();

        machine.on_event(
            &mut ctx,
            CooperateEvent::RemoteStop(RemoteStopEvent {
                network_id: NetworkId::from("C"),
            }),
        );
        assert_eq!(machine.status(), CooperateStatus::Out);
        assert_eq!(ctx.peer(), Some(&NetworkId::from("B")));
        assert_eq!(mocks.transport.sent(), sent);
        assert_eq!(mocks.notifier.all(), notified);
    }

    #[test]
    fn remote_stop_leaves_claimed_start_slot_alone() {
        let (mut ctx, _mocks, _) = context("A");
        let mut machine = StateMachine::new();
        machine.on_event(&mut ctx, enable(100));
        machine.on_event(&mut ctx, online("B"));
        machine.on_event(&mut ctx, CooperateEvent::RemoteStart(remote_start("B", "B")));
        assert_eq!(machine.status(), CooperateStatus::In);

        // A start request has claimed the slot but is still queued.
        assert!(ctx.events.busy().try_begin_start());
        machine.on_event(
            &mut ctx,
            CooperateEvent::RemoteStop(RemoteStopEvent {
                network_id: NetworkId::from("B"),
            }),
        );
        assert_eq!(machine.status(), CooperateStatus::Free);
        assert!(ctx.events.busy().is_starting());
        assert!(!ctx.events.busy().try_begin_start());

        let (event, mut sink) = start("C", 3);
        machine.on_event(&mut ctx, CooperateEvent::Start(event));
        assert!(sink.try_recv().is_ok());
        assert!(!ctx.events.busy().is_starting());
    }

    #[test]
    fn quit_cancels_relay_and_releases_observers() {
        let (mut ctx, mocks, _) = context("C");
        let mut machine = StateMachine::new();
        machine.on_event(&mut ctx, enable(100));
        machine.on_event(&mut ctx, online("B"));
        machine.on_event(&mut ctx, CooperateEvent::RemoteStart(remote_start("B", "B")));
        assert_eq!(machine.status(), CooperateStatus::In);

        assert!(ctx.events.busy().try_begin_start());
        let (event, _) = start("D", 3);
        machine.on_event(&mut ctx, CooperateEvent::Start(event));
        assert!(machine.relay_phase().is_some_and(RelayPhase::is_pending));

        machine.on_event(&mut ctx, CooperateEvent::Quit);
        assert!(mocks.timer.armed().is_empty());
        assert!(mocks.profile.watches().is_empty());
        assert_eq!(mocks.input.monitor_count(), 0);
        assert!(!mocks.sessions.observed(Pid(100)));
        assert!(matches!(
            mocks.notifier.start_results().as_slice(),
            [Notification::StartResult {
                result: Err(CoordinationErrCode::Cancelled),
                ..
            }]
        ));
    }

    fn pointer_at(x: i32, y: i32) -> CooperateEvent {
        CooperateEvent::InputPointerEvent(InputPointerEvent {
            device_id: DeviceId(5),
            pointer_action: PointerAction::Move,
            source_type: SourceType::Mouse,
            position: Coordinate::new(x, y),
        })
    }

    #[test]
    fn hot_area_listener_follows_the_local_cursor_while_free() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        mocks.input.set_display(DisplayGeometry::new(1920, 1080));
        mocks.input.set_cursor(Coordinate::new(960, 540));
        let listener = Pid(7);
        machine.on_event(
            &mut ctx,
            CooperateEvent::RegisterHotAreaListener(RegisterHotAreaListenerEvent { pid: listener }),
        );
        machine.on_event(&mut ctx, enable(100));
        assert_eq!(
            mocks.notifier.for_pid(listener),
            vec![Notification::HotArea {
                position: Coordinate::new(960, 540),
                area: HotArea::None,
                is_edge: false,
            }]
        );

        mocks.notifier.clear();
        machine.on_event(&mut ctx, pointer_at(0, 540));
        assert_eq!(ctx.hot_area.current(), HotArea::Left);
        assert_eq!(mocks.notifier.for_pid(listener).len(), 1);

        // Out does not report hot areas; the local mouse also ends Out.
        out_with(&mut ctx, &mut machine, "B");
        mocks.notifier.clear();
        machine.on_event(&mut ctx, pointer_at(3, 540));
        assert!(mocks.notifier.for_pid(listener).is_empty());
        assert_eq!(machine.status(), CooperateStatus::Free);

        machine.on_event(
            &mut ctx,
            CooperateEvent::UnregisterHotAreaListener(UnregisterHotAreaListenerEvent {
                pid: listener,
            }),
        );
        machine.on_event(&mut ctx, pointer_at(0, 540));
        assert!(mocks.notifier.for_pid(listener).is_empty());
    }

    #[test]
    fn mouse_location_is_shared_with_subscribers_and_listeners() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        mocks.input.set_display(DisplayGeometry::new(1920, 1080));
        let local_listener = Pid(11);
        machine.on_event(
            &mut ctx,
            CooperateEvent::RegisterEventListener(RegisterEventListenerEvent {
                pid: local_listener,
                network_id: NetworkId::default(),
            }),
        );
        machine.on_event(
            &mut ctx,
            CooperateEvent::SubscribeMouseLocation(MouseLocationSubscriptionEvent {
                network_id: NetworkId::from("C"),
            }),
        );

        machine.on_event(&mut ctx, pointer_at(400, 300));
        let location = MouseLocation {
            position: Coordinate::new(400, 300),
            display: DisplayGeometry::new(1920, 1080),
        };
        assert_eq!(
            mocks.transport.sent_to("C"),
            vec![
                PeerMessage::ReplySubscribeMouseLocation { result: true },
                PeerMessage::MouseLocation { location },
            ]
        );
        assert_eq!(
            mocks.notifier.for_pid(local_listener),
            vec![Notification::MouseLocation {
                network_id: NetworkId::from("A"),
                location,
            }]
        );

        machine.on_event(
            &mut ctx,
            CooperateEvent::SessionClosed(SessionClosedEvent {
                network_id: NetworkId::from("C"),
            }),
        );
        assert_eq!(ctx.mouse_location.subscribers().count(), 0);
    }

    #[test]
    fn remote_mouse_location_reaches_listener_until_app_closes() {
        let (mut ctx, mocks, _) = context("A");
        let mut machine = StateMachine::new();
        let listener = Pid(12);
        machine.on_event(
            &mut ctx,
            CooperateEvent::RegisterEventListener(RegisterEventListenerEvent {
                pid: listener,
                network_id: NetworkId::from("B"),
            }),
        );
        assert_eq!(
            mocks.transport.sent_to("B"),
            vec![PeerMessage::SubscribeMouseLocation]
        );
        machine.on_event(
            &mut ctx,
            CooperateEvent::ReplySubscribeMouseLocation(MouseLocationReplyEvent {
                network_id: NetworkId::from("B"),
                result: true,
            }),
        );

        let remote = RemoteMouseLocationEvent {
            network_id: NetworkId::from("B"),
            location: MouseLocation::default(),
        };
        machine.on_event(&mut ctx, CooperateEvent::RemoteMouseLocation(remote.clone()));
        assert_eq!(mocks.notifier.for_pid(listener).len(), 1);

        machine.on_event(&mut ctx, CooperateEvent::AppClosed(AppClosedEvent { pid: listener }));
        assert_eq!(
            mocks.transport.sent_to("B").last(),
            Some(&PeerMessage::UnsubscribeMouseLocation)
        );
        machine.on_event(&mut ctx, CooperateEvent::RemoteMouseLocation(remote));
        assert_eq!(mocks.notifier.for_pid(listener).len(), 1);
        assert_eq!(machine.status(), CooperateStatus::Free);
    }

    #[test]
    fn legal_transitions_go_through_free() {
        use CooperateStatus::{Free, In, Out};
        assert!(is_legal(Free, Out));
        assert!(is_legal(In, Free));
        assert!(!is_legal(In, Out));
        assert!(!is_legal(Out, In));
    }
}
