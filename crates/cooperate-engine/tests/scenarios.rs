//! End-to-end scenarios on a single engine with mock collaborators.

mod common;

use std::time::Duration;

use common::{remote_start, Rig};
use cooperate_types::{
    CoordinationErrCode, CooperateEvent, CooperateStatus, NetworkId, Notification, PeerMessage,
    RelayCooperateFinishedEvent, RemoteStartResponseEvent, RemoteStopEvent,
};

fn relay_finished(from: &str, target: &str, normal: bool) -> CooperateEvent {
    CooperateEvent::RelayCooperateFinished(RelayCooperateFinishedEvent {
        network_id: NetworkId::from(from),
        target_network_id: NetworkId::from(target),
        normal,
        uid: 1,
    })
}

#[test]
fn start_goes_out_and_stays_out_on_ack() {
    let mut a = Rig::new("A");
    let mut sink = a.start("B", 3);

    assert_eq!(sink.try_recv().unwrap(), Ok(()));
    assert_eq!(a.status(), CooperateStatus::Out);
    assert_eq!(a.mocks.transport.opened(), vec![NetworkId::from("B")]);
    assert!(matches!(
        a.mocks.transport.sent_to("B").as_slice(),
        [PeerMessage::StartCooperate { origin, .. }] if origin.as_str() == "A"
    ));

    a.dispatch(CooperateEvent::RemoteStartResponse(RemoteStartResponseEvent {
        network_id: NetworkId::from("B"),
        normal: true,
    }));
    assert_eq!(a.status(), CooperateStatus::Out);
    assert_eq!(a.ctx.peer(), Some(&NetworkId::from("B")));
    assert_eq!(a.ctx.start_device_id().0, 3);
}

#[test]
fn start_towards_peer_comes_back_without_new_session() {
    let mut a = Rig::new("A");
    a.paired_in("B");

    let mut sink = a.start("B", 3);

    assert_eq!(sink.try_recv().unwrap(), Ok(()));
    assert_eq!(a.status(), CooperateStatus::Free);
    assert!(a.mocks.transport.opened().is_empty());
    assert!(matches!(
        a.mocks.transport.sent_to("B").as_slice(),
        [PeerMessage::ComeBack { origin, .. }] if origin.as_str() == "A"
    ));
    assert!(matches!(
        a.mocks.notifier.start_results().as_slice(),
        [Notification::StartResult { result: Ok(()), .. }]
    ));
}

#[test]
fn relay_confirmed_in_time_hands_over_to_target() {
    let mut a = Rig::new("A");
    a.paired_in("B");

    a.start("C", 3);
    assert_eq!(a.status(), CooperateStatus::In);
    assert_eq!(a.mocks.transport.opened(), vec![NetworkId::from("C")]);
    assert!(matches!(
        a.mocks.transport.sent_to("B").as_slice(),
        [PeerMessage::RelayCooperate { target, .. }] if target.as_str() == "C"
    ));
    let armed = a.mocks.timer.armed();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].1, Duration::from_millis(2000));

    a.dispatch(relay_finished("B", "C", true));

    assert_eq!(a.status(), CooperateStatus::Free);
    assert!(a.mocks.timer.armed().is_empty());
    assert_eq!(a.mocks.timer.removed(), vec![armed[0].0]);
    assert!(matches!(
        a.mocks.transport.sent_to("C").as_slice(),
        [PeerMessage::StartCooperate { origin, .. }] if origin.as_str() == "B"
    ));
    assert!(matches!(
        a.mocks.notifier.start_results().as_slice(),
        [Notification::StartResult { result: Ok(()), .. }]
    ));
}

#[test]
fn relay_timeout_fails_the_caller_and_reverts_to_free() {
    let mut a = Rig::new("A");
    a.paired_in("B");
    a.start("C", 3);

    assert_eq!(a.fire_timers(), 1);

    assert_eq!(a.status(), CooperateStatus::Free);
    assert_eq!(
        a.mocks.notifier.start_results(),
        vec![Notification::StartResult {
            user_data: 1,
            network_id: NetworkId::from("C"),
            result: Err(CoordinationErrCode::RelayFailed),
        }]
    );
    assert_eq!(
        a.mocks.transport.sent_to("B").last(),
        Some(&PeerMessage::StopCooperate)
    );
}

#[test]
fn late_answer_after_timeout_is_ignored() {
    let mut a = Rig::new("A");
    a.paired_in("B");
    a.start("C", 3);
    a.fire_timers();

    a.dispatch(relay_finished("B", "C", true));

    assert_eq!(a.status(), CooperateStatus::Free);
    assert_eq!(a.mocks.notifier.start_results().len(), 1);
    assert!(a.mocks.transport.sent_to("C").is_empty());
}

#[test]
fn answer_before_timeout_leaves_nothing_to_fire() {
    let mut a = Rig::new("A");
    a.paired_in("B");
    a.start("C", 3);
    a.dispatch(relay_finished("B", "C", false));

    assert_eq!(a.fire_timers(), 0);
    assert_eq!(a.status(), CooperateStatus::Free);
    assert_eq!(a.mocks.notifier.start_results().len(), 1);
}

#[test]
fn second_start_during_relay_is_busy_and_arms_nothing() {
    let mut a = Rig::new("A");
    a.paired_in("B");
    a.start("C", 3);

    // Bypass the busy flag to reach the engine directly.
    let (event, mut sink) = common::start_event("D", 3);
    a.dispatch(CooperateEvent::Start(event));

    assert_eq!(sink.try_recv().unwrap(), Err(CoordinationErrCode::Busy));
    assert_eq!(a.mocks.timer.added().len(), 1);
    assert!(a.ctx.events.busy().is_starting());

    // The API path is refused before any traffic.
    let mut refused = a.start("D", 3);
    assert!(refused.try_recv().is_err());
    assert_eq!(a.mocks.transport.opened(), vec![NetworkId::from("C")]);
}

#[test]
fn remote_stop_from_non_peer_changes_nothing() {
    let mut a = Rig::new("A");
    a.start("B", 3);
    a.mocks.transport.clear_history();

    a.dispatch(CooperateEvent::RemoteStop(RemoteStopEvent {
        network_id: NetworkId::from("C"),
    }));

    assert_eq!(a.status(), CooperateStatus::Out);
    assert_eq!(a.ctx.peer(), Some(&NetworkId::from("B")));
    assert!(a.mocks.transport.sent().is_empty());

    a.dispatch(CooperateEvent::RemoteStop(RemoteStopEvent {
        network_id: NetworkId::from("B"),
    }));
    assert_eq!(a.status(), CooperateStatus::Free);
}

#[test]
fn remote_start_from_third_device_waits_for_relay() {
    let mut a = Rig::new("A");
    a.paired_in("B");
    a.start("C", 3);

    a.dispatch(CooperateEvent::RemoteStart(remote_start("D", "D")));
    assert_eq!(a.ctx.peer(), Some(&NetworkId::from("B")));
    assert_eq!(a.ctx.deferred_timer_count(), 1);

    // The relay settles first, then the deferred start is replayed.
    a.dispatch(relay_finished("B", "C", true));
    assert_eq!(a.status(), CooperateStatus::Free);
    let (deferred, _) = a.mocks.timer.armed()[0];
    assert!(a.mocks.timer.fire(deferred));
    assert_eq!(a.ctx.deferred_timer_count(), 0);
    a.pump();

    assert_eq!(a.status(), CooperateStatus::In);
    assert_eq!(a.ctx.peer(), Some(&NetworkId::from("D")));
}

#[test]
fn send_failure_is_handled_as_session_loss() {
    let mut a = Rig::new("A");
    a.start("B", 3);
    a.mocks.transport.fail_send("B");

    a.dispatch(common::stop(false));

    assert_eq!(a.status(), CooperateStatus::Free);
    assert!(matches!(
        a.mocks.notifier.stop_results().as_slice(),
        [Notification::StopResult {
            result: Err(CoordinationErrCode::SendPacketFailed),
            ..
        }]
    ));
}
