//! Mock collaborators for testing.
//!
//! Every mock is cheap to clone and clones share state, so a test keeps one
//! copy for observation and hands another to the engine through
//! [`MockEnvironment::environment`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cooperate_types::{
    Coordinate, DeviceId, DeviceInfo, DisplayGeometry, InputPointerEvent, NetworkId,
    Notification, PeerMessage, Pid,
};
use parking_lot::Mutex;

use crate::error::{AdapterError, TimerError};
use crate::{
    AccessPolicy, ClientNotifier, ClientSessions, DeviceManager, DeviceProfile,
    DeviceRemovedCallback, DragManager, Environment, InboundCallback, InputAdapter, MonitorId,
    PointerCallback, SessionDeletedCallback, TimerCallback, TimerId, TimerService, Transport,
};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TransportState {
    opened: Vec<NetworkId>,
    sessions: BTreeSet<NetworkId>,
    closed: Vec<NetworkId>,
    close_all_count: u32,
    sent: Vec<(NetworkId, PeerMessage)>,
    failing_opens: HashSet<NetworkId>,
    failing_sends: HashSet<NetworkId>,
}

/// Records sessions and sent messages; opens and sends can be made to fail
/// per peer.
#[derive(Clone)]
pub struct MockTransport {
    local: NetworkId,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    #[must_use]
    pub fn new(local: impl Into<NetworkId>) -> Self {
        Self {
            local: local.into(),
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    pub fn fail_open(&self, peer: impl Into<NetworkId>) {
        self.state.lock().failing_opens.insert(peer.into());
    }

    pub fn fail_send(&self, peer: impl Into<NetworkId>) {
        self.state.lock().failing_sends.insert(peer.into());
    }

    /// Every successful `open_session` call, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<NetworkId> {
        self.state.lock().opened.clone()
    }

    #[must_use]
    pub fn sessions(&self) -> BTreeSet<NetworkId> {
        self.state.lock().sessions.clone()
    }

    #[must_use]
    pub fn closed(&self) -> Vec<NetworkId> {
        self.state.lock().closed.clone()
    }

    #[must_use]
    pub fn close_all_count(&self) -> u32 {
        self.state.lock().close_all_count
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(NetworkId, PeerMessage)> {
        self.state.lock().sent.clone()
    }

    #[must_use]
    pub fn sent_to(&self, peer: &str) -> Vec<PeerMessage> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(to, _)| to.as_str() == peer)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Forget recorded opens and sends, keeping failure configuration.
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.opened.clear();
        state.closed.clear();
        state.sent.clear();
        state.close_all_count = 0;
    }
}

impl Transport for MockTransport {
    fn local_network_id(&self) -> NetworkId {
        self.local.clone()
    }

    fn open_session(&self, peer: &NetworkId) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        if state.failing_opens.contains(peer) {
            return Err(AdapterError::OpenSession(peer.clone()));
        }
        state.opened.push(peer.clone());
        state.sessions.insert(peer.clone());
        Ok(())
    }

    fn close_session(&self, peer: &NetworkId) {
        let mut state = self.state.lock();
        state.sessions.remove(peer);
        state.closed.push(peer.clone());
    }

    fn close_all_sessions(&self) {
        let mut state = self.state.lock();
        state.sessions.clear();
        state.close_all_count += 1;
    }

    fn send(&self, peer: &NetworkId, msg: PeerMessage) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        if state.failing_sends.contains(peer) {
            return Err(AdapterError::Send {
                peer: peer.clone(),
                kind: msg.name(),
            });
        }
        state.sent.push((peer.clone(), msg));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoopbackHub
// ---------------------------------------------------------------------------

type SharedInbound = Arc<dyn Fn(NetworkId, PeerMessage) + Send + Sync>;

#[derive(Default)]
struct HubState {
    inbound: HashMap<NetworkId, SharedInbound>,
    log: Vec<(NetworkId, NetworkId, PeerMessage)>,
}

/// In-process network connecting several engines.
///
/// Each device attaches an inbound callback; its [`LoopbackTransport`]
/// delivers sent messages synchronously to the receiver's callback.
/// Opening a session or sending to a detached device fails.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport endpoint for `local`.
    #[must_use]
    pub fn transport(&self, local: impl Into<NetworkId>) -> LoopbackTransport {
        LoopbackTransport {
            local: local.into(),
            hub: self.clone(),
            sessions: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn attach(&self, local: impl Into<NetworkId>, inbound: InboundCallback) {
        self.state.lock().inbound.insert(local.into(), Arc::from(inbound));
    }

    /// Take `local` off the network.
    pub fn detach(&self, local: &NetworkId) {
        self.state.lock().inbound.remove(local);
    }

    #[must_use]
    pub fn is_attached(&self, local: &NetworkId) -> bool {
        self.state.lock().inbound.contains_key(local)
    }

    /// Every delivered message as `(from, to, message)`.
    #[must_use]
    pub fn delivered(&self) -> Vec<(NetworkId, NetworkId, PeerMessage)> {
        self.state.lock().log.clone()
    }

    fn deliver(&self, from: &NetworkId, to: &NetworkId, msg: PeerMessage) -> bool {
        let inbound = {
            let mut state = self.state.lock();
            let Some(inbound) = state.inbound.get(to).cloned() else {
                return false;
            };
            state.log.push((from.clone(), to.clone(), msg.clone()));
            inbound
        };
        inbound(from.clone(), msg);
        true
    }
}

/// [`Transport`] endpoint of one device on a [`LoopbackHub`].
#[derive(Clone)]
pub struct LoopbackTransport {
    local: NetworkId,
    hub: LoopbackHub,
    sessions: Arc<Mutex<BTreeSet<NetworkId>>>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn sessions(&self) -> BTreeSet<NetworkId> {
        self.sessions.lock().clone()
    }
}

impl Transport for LoopbackTransport {
    fn local_network_id(&self) -> NetworkId {
        self.local.clone()
    }

    fn open_session(&self, peer: &NetworkId) -> Result<(), AdapterError> {
        if !self.hub.is_attached(peer) {
            return Err(AdapterError::OpenSession(peer.clone()));
        }
        self.sessions.lock().insert(peer.clone());
        Ok(())
    }

    fn close_session(&self, peer: &NetworkId) {
        self.sessions.lock().remove(peer);
    }

    fn close_all_sessions(&self) {
        self.sessions.lock().clear();
    }

    fn send(&self, peer: &NetworkId, msg: PeerMessage) -> Result<(), AdapterError> {
        let kind = msg.name();
        if self.hub.deliver(&self.local, peer, msg) {
            Ok(())
        } else {
            Err(AdapterError::Send {
                peer: peer.clone(),
                kind,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// ManualTimer
// ---------------------------------------------------------------------------

struct ManualEntry {
    delay: Duration,
    repeat: u32,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualTimerState {
    next_id: u64,
    live: BTreeMap<TimerId, ManualEntry>,
    added: Vec<(TimerId, Duration)>,
    removed: Vec<TimerId>,
}

/// Timer service whose timers only fire when the test says so.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live timers with their delays.
    #[must_use]
    pub fn armed(&self) -> Vec<(TimerId, Duration)> {
        self.state
            .lock()
            .live
            .iter()
            .map(|(id, entry)| (*id, entry.delay))
            .collect()
    }

    /// Every timer ever added, in order.
    #[must_use]
    pub fn added(&self) -> Vec<(TimerId, Duration)> {
        self.state.lock().added.clone()
    }

    #[must_use]
    pub fn removed(&self) -> Vec<TimerId> {
        self.state.lock().removed.clone()
    }

    /// Run the callback of `id` once. Returns `false` if it is not live.
    pub fn fire(&self, id: TimerId) -> bool {
        let taken = self.state.lock().live.remove(&id);
        let Some(mut entry) = taken else {
            return false;
        };
        (entry.callback)();
        if entry.repeat != 1 {
            entry.repeat = entry.repeat.saturating_sub(1);
            self.state.lock().live.insert(id, entry);
        }
        true
    }

    /// Fire every live timer once. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let ids: Vec<TimerId> = self.state.lock().live.keys().copied().collect();
        ids.into_iter().filter(|id| self.fire(*id)).count()
    }
}

impl TimerService for ManualTimer {
    fn add_timer(
        &self,
        delay: Duration,
        repeat: u32,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        state.live.insert(
            id,
            ManualEntry {
                delay,
                repeat,
                callback,
            },
        );
        state.added.push((id, delay));
        Ok(id)
    }

    fn remove_timer(&self, id: TimerId) -> Result<(), TimerError> {
        let mut state = self.state.lock();
        state.live.remove(&id).ok_or(TimerError::NotFound(id))?;
        state.removed.push(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockInput
// ---------------------------------------------------------------------------

type SharedPointerCallback = Arc<dyn Fn(InputPointerEvent) + Send + Sync>;
type SharedDeviceCallback = Arc<dyn Fn(DeviceId) + Send + Sync>;

#[derive(Default)]
struct InputState {
    next_id: u32,
    monitors: HashMap<MonitorId, SharedPointerCallback>,
    device_listeners: HashMap<MonitorId, SharedDeviceCallback>,
    visibility: Vec<bool>,
    locations: Vec<Coordinate>,
    freezes: u32,
    thaws: u32,
    display: DisplayGeometry,
    cursor: Coordinate,
}

/// Records pointer visibility, placement and freeze/thaw calls, and lets a
/// test drive the installed monitors.
#[derive(Clone, Default)]
pub struct MockInput {
    state: Arc<Mutex<InputState>>,
}

impl MockInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cursor(&self, pos: Coordinate) {
        self.state.lock().cursor = pos;
    }

    pub fn set_display(&self, display: DisplayGeometry) {
        self.state.lock().display = display;
    }

    /// Deliver a pointer event to every installed monitor.
    pub fn emit_pointer(&self, event: InputPointerEvent) {
        let monitors: Vec<SharedPointerCallback> =
            self.state.lock().monitors.values().cloned().collect();
        for monitor in monitors {
            monitor(event);
        }
    }

    /// Report a local device removal to every listener.
    pub fn remove_device(&self, id: DeviceId) {
        let listeners: Vec<SharedDeviceCallback> =
            self.state.lock().device_listeners.values().cloned().collect();
        for listener in listeners {
            listener(id);
        }
    }

    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.state.lock().monitors.len()
    }

    #[must_use]
    pub fn device_listener_count(&self) -> usize {
        self.state.lock().device_listeners.len()
    }

    /// Every `set_pointer_visibility` argument, in order.
    #[must_use]
    pub fn visibility_history(&self) -> Vec<bool> {
        self.state.lock().visibility.clone()
    }

    #[must_use]
    pub fn locations(&self) -> Vec<Coordinate> {
        self.state.lock().locations.clone()
    }

    #[must_use]
    pub fn freeze_count(&self) -> u32 {
        self.state.lock().freezes
    }

    #[must_use]
    pub fn thaw_count(&self) -> u32 {
        self.state.lock().thaws
    }
}

impl InputAdapter for MockInput {
    fn add_monitor(&self, callback: PointerCallback) -> Result<MonitorId, AdapterError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = MonitorId(state.next_id);
        state.monitors.insert(id, Arc::from(callback));
        Ok(id)
    }

    fn remove_monitor(&self, id: MonitorId) {
        self.state.lock().monitors.remove(&id);
    }

    fn add_device_listener(
        &self,
        callback: DeviceRemovedCallback,
    ) -> Result<MonitorId, AdapterError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = MonitorId(state.next_id);
        state.device_listeners.insert(id, Arc::from(callback));
        Ok(id)
    }

    fn remove_device_listener(&self, id: MonitorId) {
        self.state.lock().device_listeners.remove(&id);
    }

    fn set_pointer_visibility(&self, visible: bool) {
        self.state.lock().visibility.push(visible);
    }

    fn set_pointer_location(&self, pos: Coordinate) {
        let mut state = self.state.lock();
        state.locations.push(pos);
        state.cursor = pos;
    }

    fn freeze_cursor(&self) {
        self.state.lock().freezes += 1;
    }

    fn thaw_cursor(&self) {
        self.state.lock().thaws += 1;
    }

    fn display_size(&self) -> DisplayGeometry {
        self.state.lock().display
    }

    fn cursor_position(&self) -> Coordinate {
        self.state.lock().cursor
    }
}

// ---------------------------------------------------------------------------
// MockDeviceManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DeviceState {
    has_pointer: bool,
    next_id: i32,
    virtual_devices: BTreeMap<DeviceId, DeviceInfo>,
}

#[derive(Clone)]
pub struct MockDeviceManager {
    state: Arc<Mutex<DeviceState>>,
}

/// Virtual device ids start here so they never collide with test mice.
const FIRST_VIRTUAL_ID: i32 = 100;

impl Default for MockDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                has_pointer: true,
                next_id: FIRST_VIRTUAL_ID,
                virtual_devices: BTreeMap::new(),
            })),
        }
    }

    pub fn set_has_local_pointer(&self, present: bool) {
        self.state.lock().has_pointer = present;
    }

    #[must_use]
    pub fn virtual_devices(&self) -> BTreeMap<DeviceId, DeviceInfo> {
        self.state.lock().virtual_devices.clone()
    }
}

impl DeviceManager for MockDeviceManager {
    fn has_local_pointer_device(&self) -> bool {
        self.state.lock().has_pointer
    }

    fn add_virtual_input_devices(
        &self,
        devices: &[DeviceInfo],
    ) -> Result<Vec<DeviceId>, AdapterError> {
        let mut state = self.state.lock();
        let mut ids = Vec::with_capacity(devices.len());
        for info in devices {
            let id = DeviceId(state.next_id);
            state.next_id += 1;
            state.virtual_devices.insert(id, info.clone());
            ids.push(id);
        }
        Ok(ids)
    }

    fn remove_virtual_input_devices(&self, ids: &[DeviceId]) {
        let mut state = self.state.lock();
        for id in ids {
            state.virtual_devices.remove(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Policy, drag, profile
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PolicyState {
    untrusted: HashSet<NetworkId>,
    denied: HashSet<NetworkId>,
}

/// Trusts and allows every peer unless told otherwise.
#[derive(Clone, Default)]
pub struct MockPolicy {
    state: Arc<Mutex<PolicyState>>,
}

impl MockPolicy {
    pub fn distrust(&self, peer: impl Into<NetworkId>) {
        self.state.lock().untrusted.insert(peer.into());
    }

    pub fn deny(&self, peer: impl Into<NetworkId>) {
        self.state.lock().denied.insert(peer.into());
    }
}

impl AccessPolicy for MockPolicy {
    fn check_same_account(&self, peer: &NetworkId) -> bool {
        !self.state.lock().untrusted.contains(peer)
    }

    fn is_allowed(&self, peer: &NetworkId) -> bool {
        !self.state.lock().denied.contains(peer)
    }
}

#[derive(Clone, Default)]
pub struct MockDrag {
    dragging: Arc<AtomicBool>,
}

impl MockDrag {
    pub fn set_dragging(&self, dragging: bool) {
        self.dragging.store(dragging, Ordering::SeqCst);
    }
}

impl DragManager for MockDrag {
    fn is_motion_dragging(&self) -> bool {
        self.dragging.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct MockProfile {
    watches: Arc<Mutex<BTreeSet<NetworkId>>>,
}

impl MockProfile {
    #[must_use]
    pub fn watches(&self) -> BTreeSet<NetworkId> {
        self.watches.lock().clone()
    }
}

impl DeviceProfile for MockProfile {
    fn add_watch(&self, network_id: &NetworkId) {
        self.watches.lock().insert(network_id.clone());
    }

    fn remove_watch(&self, network_id: &NetworkId) {
        self.watches.lock().remove(network_id);
    }
}

// ---------------------------------------------------------------------------
// Client sessions and notifications
// ---------------------------------------------------------------------------

type SharedSessionCallback = Arc<dyn Fn(Pid) + Send + Sync>;

/// Tracks session-deleted callbacks; [`MockSessions::kill`] simulates a
/// client process dying.
#[derive(Clone, Default)]
pub struct MockSessions {
    callbacks: Arc<Mutex<HashMap<Pid, SharedSessionCallback>>>,
}

impl MockSessions {
    pub fn kill(&self, pid: Pid) {
        let callback = self.callbacks.lock().get(&pid).cloned();
        if let Some(callback) = callback {
            callback(pid);
        }
    }

    #[must_use]
    pub fn observed(&self, pid: Pid) -> bool {
        self.callbacks.lock().contains_key(&pid)
    }
}

impl ClientSessions for MockSessions {
    fn add_session_deleted_callback(&self, pid: Pid, callback: SessionDeletedCallback) {
        self.callbacks.lock().insert(pid, Arc::from(callback));
    }

    fn remove_session_deleted_callback(&self, pid: Pid) {
        self.callbacks.lock().remove(&pid);
    }
}

/// Records every notification.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    log: Arc<Mutex<Vec<(Pid, Notification)>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn all(&self) -> Vec<(Pid, Notification)> {
        self.log.lock().clone()
    }

    #[must_use]
    pub fn for_pid(&self, pid: Pid) -> Vec<Notification> {
        self.log
            .lock()
            .iter()
            .filter(|(to, _)| *to == pid)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// `StartResult` notifications, in order.
    #[must_use]
    pub fn start_results(&self) -> Vec<Notification> {
        self.matching(|n| matches!(n, Notification::StartResult { .. }))
    }

    #[must_use]
    pub fn stop_results(&self) -> Vec<Notification> {
        self.matching(|n| matches!(n, Notification::StopResult { .. }))
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    fn matching(&self, pred: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        self.log
            .lock()
            .iter()
            .map(|(_, n)| n)
            .filter(|n| pred(n))
            .cloned()
            .collect()
    }
}

impl ClientNotifier for RecordingNotifier {
    fn notify(&self, pid: Pid, notification: Notification) {
        tracing::trace!(%pid, ?notification, "notify");
        self.log.lock().push((pid, notification));
    }
}

// ---------------------------------------------------------------------------
// MockEnvironment
// ---------------------------------------------------------------------------

/// One of every mock, wired into an [`Environment`].
#[derive(Clone)]
pub struct MockEnvironment {
    pub transport: MockTransport,
    pub timer: ManualTimer,
    pub input: MockInput,
    pub devices: MockDeviceManager,
    pub policy: MockPolicy,
    pub drag: MockDrag,
    pub profile: MockProfile,
    pub sessions: MockSessions,
    pub notifier: RecordingNotifier,
}

impl MockEnvironment {
    #[must_use]
    pub fn new(local: impl Into<NetworkId>) -> Self {
        Self {
            transport: MockTransport::new(local),
            timer: ManualTimer::new(),
            input: MockInput::new(),
            devices: MockDeviceManager::new(),
            policy: MockPolicy::default(),
            drag: MockDrag::default(),
            profile: MockProfile::default(),
            sessions: MockSessions::default(),
            notifier: RecordingNotifier::default(),
        }
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment_with_timer(Arc::new(self.timer.clone()))
    }

    /// Same as [`MockEnvironment::environment`] with a real timer service.
    #[must_use]
    pub fn environment_with_timer(&self, timer: Arc<dyn TimerService>) -> Environment {
        self.environment_with(Arc::new(self.transport.clone()), timer)
    }

    /// Environment with the given transport and timer service; every other
    /// collaborator is this bundle's mock.
    #[must_use]
    pub fn environment_with(
        &self,
        transport: Arc<dyn Transport>,
        timer: Arc<dyn TimerService>,
    ) -> Environment {
        Environment {
            transport,
            timer,
            input: Arc::new(self.input.clone()),
            devices: Arc::new(self.devices.clone()),
            policy: Arc::new(self.policy.clone()),
            drag: Arc::new(self.drag.clone()),
            profile: Arc::new(self.profile.clone()),
            sessions: Arc::new(self.sessions.clone()),
            notifier: Arc::new(self.notifier.clone()),
        }
    }
}
