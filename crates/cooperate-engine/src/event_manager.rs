//! Client-facing bookkeeping: listeners, pending requests, busy flags.
//!
//! The listener registry and the busy flags are shared with the public API
//! and carry their own synchronization; everything else is owned by the
//! worker through [`crate::context::Context`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cooperate_adapters::ClientNotifier;
use cooperate_types::{
    CoordinationErrCode, CoordinationMessage, CooperateStatus, NetworkId, Notification, Pid,
};
use parking_lot::Mutex;
use tracing::debug;

/// Registered listener pids.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<BTreeSet<Pid>>>,
}

impl ListenerRegistry {
    /// Returns `false` when `pid` was already registered.
    pub fn add(&self, pid: Pid) -> bool {
        self.inner.lock().insert(pid)
    }

    pub fn remove(&self, pid: Pid) -> bool {
        self.inner.lock().remove(&pid)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Pid> {
        self.inner.lock().iter().copied().collect()
    }

    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.inner.lock().contains(&pid)
    }
}

/// `is_starting` / `is_stopping`, set by the API before enqueueing and
/// cleared by the worker when the request finishes.
#[derive(Debug, Default)]
pub struct BusyFlags {
    starting: AtomicBool,
    stopping: AtomicBool,
}

impl BusyFlags {
    /// Claim the start slot. Returns `false` if a start is in progress.
    pub fn try_begin_start(&self) -> bool {
        self.starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_start(&self) {
        self.starting.store(false, Ordering::Release);
    }

    pub fn try_begin_stop(&self) -> bool {
        self.stopping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_stop(&self) {
        self.stopping.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

/// Kind of client call awaiting its final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    Start,
    Stop,
}

/// A client call awaiting its final result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub pid: Pid,
    pub user_data: i32,
    pub network_id: NetworkId,
}

pub struct EventManager {
    notifier: Arc<dyn ClientNotifier>,
    listeners: ListenerRegistry,
    busy: Arc<BusyFlags>,
    pending: HashMap<CallKind, PendingRequest>,
}

impl EventManager {
    #[must_use]
    pub fn new(notifier: Arc<dyn ClientNotifier>) -> Self {
        Self {
            notifier,
            listeners: ListenerRegistry::default(),
            busy: Arc::new(BusyFlags::default()),
            pending: HashMap::new(),
        }
    }

    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    #[must_use]
    pub fn busy(&self) -> &Arc<BusyFlags> {
        &self.busy
    }

    pub fn add_listener(&self, pid: Pid) {
        if !self.listeners.add(pid) {
            debug!(%pid, "listener already registered");
        }
    }

    pub fn remove_listener(&self, pid: Pid) {
        if !self.listeners.remove(pid) {
            debug!(%pid, "listener was not registered");
        }
    }

    #[must_use]
    pub fn pending(&self, kind: CallKind) -> Option<&PendingRequest> {
        self.pending.get(&kind)
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = (&CallKind, &PendingRequest)> {
        self.pending.iter()
    }

    pub fn enable(&self, pid: Pid, network_id: &NetworkId) {
        self.notify(
            pid,
            Notification::Message {
                network_id: network_id.clone(),
                msg: CoordinationMessage::PrepareSuccess,
            },
        );
    }

    pub fn disable(&self, pid: Pid, network_id: &NetworkId) {
        self.notify(
            pid,
            Notification::Message {
                network_id: network_id.clone(),
                msg: CoordinationMessage::UnprepareSuccess,
            },
        );
    }

    /// Record an accepted start request.
    pub fn start_cooperate(&mut self, request: PendingRequest) {
        if let Some(previous) = self.pending.insert(CallKind::Start, request) {
            debug!(pid = %previous.pid, "replaced pending start request");
        }
    }

    /// Deliver the final result of the pending start, if any.
    pub fn start_finish(&mut self, network_id: &NetworkId, result: Result<(), CoordinationErrCode>) {
        self.busy.end_start();
        let Some(request) = self.pending.remove(&CallKind::Start) else {
            debug!(peer = %network_id.anonymize(), "start finished with no pending request");
            return;
        };
        let msg = if result.is_ok() {
            CoordinationMessage::ActivateSuccess
        } else {
            CoordinationMessage::ActivateFail
        };
        self.notify(
            request.pid,
            Notification::StartResult {
                user_data: request.user_data,
                network_id: request.network_id.clone(),
                result,
            },
        );
        self.broadcast(Notification::Message {
            network_id: request.network_id,
            msg,
        });
    }

    /// Drop the pending start without a result (its caller was answered
    /// synchronously).
    pub fn cancel_start(&mut self) {
        self.busy.end_start();
        self.pending.remove(&CallKind::Start);
    }

    pub fn stop_cooperate(&mut self, request: PendingRequest) {
        if let Some(previous) = self.pending.insert(CallKind::Stop, request) {
            debug!(pid = %previous.pid, "replaced pending stop request");
        }
    }

    /// Deliver the final result of the pending stop, if any, and tell the
    /// listeners that cooperation with `network_id` ended.
    pub fn stop_finish(&mut self, network_id: &NetworkId, result: Result<(), CoordinationErrCode>) {
        self.busy.end_stop();
        let msg = if result.is_ok() {
            CoordinationMessage::DeactivateSuccess
        } else {
            CoordinationMessage::DeactivateFail
        };
        if let Some(request) = self.pending.remove(&CallKind::Stop) {
            self.notify(
                request.pid,
                Notification::StopResult {
                    user_data: request.user_data,
                    network_id: network_id.clone(),
                    result,
                },
            );
        }
        self.broadcast(Notification::Message {
            network_id: network_id.clone(),
            msg,
        });
    }

    pub fn remote_start(&self, network_id: &NetworkId) {
        self.broadcast_message(network_id, CoordinationMessage::Activate);
    }

    pub fn remote_stop(&self, network_id: &NetworkId) {
        self.broadcast_message(network_id, CoordinationMessage::DeactivateSuccess);
    }

    pub fn come_back(&self, network_id: &NetworkId) {
        self.broadcast_message(network_id, CoordinationMessage::ComeBack);
    }

    pub fn relay(&self, target: &NetworkId) {
        self.broadcast_message(target, CoordinationMessage::Relay);
    }

    pub fn unchain(&self, network_id: &NetworkId) {
        self.broadcast_message(network_id, CoordinationMessage::Unchain);
    }

    pub fn session_closed(&self, network_id: &NetworkId) {
        self.broadcast_message(network_id, CoordinationMessage::SessionClosed);
    }

    pub fn profile_changed(&self, network_id: &NetworkId, normal: bool) {
        self.broadcast(Notification::ProfileChanged {
            network_id: network_id.clone(),
            normal,
        });
    }

    pub fn state_changed(&self, status: CooperateStatus) {
        self.broadcast(Notification::StateChanged { status });
    }

    pub fn reply_state(&self, pid: Pid, user_data: i32, network_id: &NetworkId, cooperating: bool) {
        self.notify(
            pid,
            Notification::State {
                user_data,
                network_id: network_id.clone(),
                cooperating,
            },
        );
    }

    fn broadcast_message(&self, network_id: &NetworkId, msg: CoordinationMessage) {
        self.broadcast(Notification::Message {
            network_id: network_id.clone(),
            msg,
        });
    }

    fn broadcast(&self, notification: Notification) {
        for pid in self.listeners.snapshot() {
            self.notifier.notify(pid, notification.clone());
        }
    }

    fn notify(&self, pid: Pid, notification: Notification) {
        self.notifier.notify(pid, notification);
    }
}

#[cfg(test)]
mod tests {
    use cooperate_adapters::mock::RecordingNotifier;

    use super::*;

    fn manager() -> (EventManager, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        (EventManager::new(Arc::new(notifier.clone())), notifier)
    }

    fn request(pid: i32, peer: &str) -> PendingRequest {
        PendingRequest {
            pid: Pid(pid),
            user_data: 7,
            network_id: NetworkId::from(peer),
        }
    }

    #[test]
    fn start_finish_completes_pending_once() {
        let (mut mgr, notifier) = manager();
        assert!(mgr.busy().try_begin_start());
        mgr.start_cooperate(request(1, "B"));

        mgr.start_finish(&NetworkId::from("B"), Ok(()));
        mgr.start_finish(&NetworkId::from("B"), Err(CoordinationErrCode::RelayFailed));

        assert_eq!(
            notifier.start_results(),
            vec![Notification::StartResult {
                user_data: 7,
                network_id: NetworkId::from("B"),
                result: Ok(()),
            }]
        );
        assert!(!mgr.busy().is_starting());
    }

    #[test]
    fn stop_finish_without_request_only_broadcasts() {
        let (mut mgr, notifier) = manager();
        mgr.add_listener(Pid(5));
        mgr.stop_finish(&NetworkId::from("B"), Ok(()));
        assert!(notifier.stop_results().is_empty());
        assert_eq!(
            notifier.for_pid(Pid(5)),
            vec![Notification::Message {
                network_id: NetworkId::from("B"),
                msg: CoordinationMessage::DeactivateSuccess,
            }]
        );
    }

    #[test]
    fn broadcasts_reach_every_listener() {
        let (mgr, notifier) = manager();
        mgr.add_listener(Pid(1));
        mgr.add_listener(Pid(2));
        mgr.add_listener(Pid(2));
        mgr.state_changed(CooperateStatus::Out);
        assert_eq!(notifier.all().len(), 2);

        mgr.remove_listener(Pid(1));
        mgr.state_changed(CooperateStatus::Free);
        assert_eq!(notifier.for_pid(Pid(1)).len(), 1);
        assert_eq!(notifier.for_pid(Pid(2)).len(), 2);
    }

    #[test]
    fn busy_flags_are_exclusive() {
        let flags = BusyFlags::default();
        assert!(flags.try_begin_start());
        assert!(!flags.try_begin_start());
        assert!(flags.try_begin_stop());
        flags.end_start();
        assert!(!flags.is_starting());
        assert!(flags.is_stopping());
        flags.end_stop();
        assert!(!flags.is_stopping());
    }
}
