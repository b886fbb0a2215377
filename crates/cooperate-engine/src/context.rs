//! Mutable cooperation state owned by the worker thread.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use cooperate_adapters::{Environment, MonitorId, TimerError, TimerId};
use cooperate_types::flag::{apply, changed_bits};
use cooperate_types::{
    AppClosedEvent, Coordinate, CoordinationErrCode, CooperateEvent, CooperateOptions, DeviceId,
    DeviceInfo, InputDeviceRemovedEvent, InputPointerEvent, MouseLocation, NetworkId, PeerMessage,
    Pid, StartCooperateEvent, UpdateCooperateFlagEvent, COOPERATE_FLAG_FREEZE_CURSOR,
    COOPERATE_FLAG_HIDE_CURSOR,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::channel::Sender;
use crate::config::{Config, TimingConfig};
use crate::event_manager::{EventManager, PendingRequest};
use crate::hot_area::HotAreaWatcher;
use crate::mouse_location::MouseLocationHub;
use crate::transport_handler::TransportHandler;

/// Pointer and touchpad speed of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speeds {
    pub pointer: i32,
    pub touchpad: i32,
}

/// Deferred timers that have not fired yet.
///
/// A timer may fire before `defer` gets its id back, so each entry is
/// keyed by a sequence number and the callback leaves a mark when it
/// wins that race.
#[derive(Debug, Default)]
struct DeferredTimers {
    next: u64,
    live: BTreeMap<u64, TimerId>,
    fired: BTreeSet<u64>,
}

/// Everything the states read and mutate.
///
/// Owned by the worker; producers never touch it.
pub struct Context {
    env: Environment,
    sender: Sender,
    transport: TransportHandler,
    timing: TimingConfig,
    local_id: NetworkId,
    peer: Option<NetworkId>,
    start_device: DeviceId,
    flag: u32,
    local_speeds: Speeds,
    peer_speeds: Option<Speeds>,
    last_pointer: Option<Coordinate>,
    virtual_devices: BTreeMap<DeviceId, String>,
    clients: BTreeSet<Pid>,
    pointer_monitor: Option<MonitorId>,
    device_listener: Option<MonitorId>,
    deferred_timers: Arc<Mutex<DeferredTimers>>,
    pub events: EventManager,
    pub hot_area: HotAreaWatcher,
    pub mouse_location: MouseLocationHub,
}

impl Context {
    pub fn new(env: Environment, sender: Sender, config: &Config) -> Self {
        let transport = TransportHandler::new(env.transport.clone(), sender.clone());
        let local_id = transport.local_network_id();
        let events = EventManager::new(env.notifier.clone());
        let hot_area = HotAreaWatcher::new(env.notifier.clone());
        let mouse_location =
            MouseLocationHub::new(local_id.clone(), transport.clone(), env.notifier.clone());
        Self {
            env,
            sender,
            transport,
            timing: config.timing.clone(),
            local_id,
            peer: None,
            start_device: DeviceId::INVALID,
            flag: COOPERATE_FLAG_HIDE_CURSOR,
            local_speeds: Speeds {
                pointer: config.engine.pointer_speed,
                touchpad: config.engine.touchpad_speed,
            },
            peer_speeds: None,
            last_pointer: None,
            virtual_devices: BTreeMap::new(),
            clients: BTreeSet::new(),
            pointer_monitor: None,
            device_listener: None,
            deferred_timers: Arc::default(),
            events,
            hot_area,
            mouse_location,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn transport(&self) -> &TransportHandler {
        &self.transport
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn local_id(&self) -> &NetworkId {
        &self.local_id
    }

    pub fn peer(&self) -> Option<&NetworkId> {
        self.peer.as_ref()
    }

    /// Current peer, or an empty id when idle. Used in notifications.
    pub fn peer_or_empty(&self) -> NetworkId {
        self.peer.clone().unwrap_or_default()
    }

    pub fn set_peer(&mut self, peer: NetworkId) {
        info!(peer = %peer.anonymize(), "peer set");
        self.peer = Some(peer);
    }

    pub fn is_local(&self, id: &NetworkId) -> bool {
        *id == self.local_id
    }

    pub fn is_peer(&self, id: &NetworkId) -> bool {
        self.peer.as_ref() == Some(id)
    }

    pub fn start_device_id(&self) -> DeviceId {
        self.start_device
    }

    pub fn set_start_device_id(&mut self, id: DeviceId) {
        self.start_device = id;
    }

    pub fn flag(&self) -> u32 {
        self.flag
    }

    pub fn need_hide_cursor(&self) -> bool {
        self.flag & COOPERATE_FLAG_HIDE_CURSOR != 0
    }

    pub fn need_freeze_cursor(&self) -> bool {
        self.flag & COOPERATE_FLAG_FREEZE_CURSOR != 0
    }

    /// Apply a flag update and return the bits that actually flipped.
    pub fn update_cooperate_flag(&mut self, event: &UpdateCooperateFlagEvent) -> u32 {
        let changed = changed_bits(event.mask, self.flag, event.flag);
        self.flag = apply(event.mask, self.flag, event.flag);
        debug!(flag = self.flag, changed, "cooperate flag updated");
        changed
    }

    pub fn local_speeds(&self) -> Speeds {
        self.local_speeds
    }

    pub fn peer_speeds(&self) -> Option<Speeds> {
        self.peer_speeds
    }

    pub fn store_peer_speeds(&mut self, speeds: Speeds) {
        self.peer_speeds = Some(speeds);
    }

    /// Record the position of a local pointer event.
    pub fn on_pointer_event(&mut self, event: &InputPointerEvent) {
        self.last_pointer = Some(event.position);
    }

    /// Where the local cursor is, with the display it is on.
    pub fn locate_cursor(&self, position: Coordinate) -> MouseLocation {
        MouseLocation {
            position,
            display: self.env.input.display_size(),
        }
    }

    pub fn last_pointer(&self) -> Option<Coordinate> {
        self.last_pointer
    }

    /// Cursor position as percent of the local display.
    pub fn normalized_cursor_position(&self) -> Coordinate {
        let display = self.env.input.display_size();
        display.normalize(self.env.input.cursor_position())
    }

    /// Move the cursor to a normalized position on the local display.
    pub fn place_cursor(&self, normalized: Coordinate) {
        let display = self.env.input.display_size();
        let pos = display.denormalize(normalized);
        debug!(%normalized, %pos, "placing cursor");
        self.env.input.set_pointer_location(pos);
    }

    /// Place the cursor for an incoming session: explicit display
    /// coordinates win over the normalized position.
    pub fn place_cursor_for(&self, normalized: Coordinate, options: Option<&CooperateOptions>) {
        match options {
            Some(opts) => {
                let pos = Coordinate::new(opts.display_x, opts.display_y);
                debug!(%pos, display = opts.display_id, "placing cursor at requested position");
                self.env.input.set_pointer_location(pos);
            }
            None => self.place_cursor(normalized),
        }
    }

    /// Send `msg` to `peer`. Returns `false` on failure, which has already
    /// been turned into a `SessionClosed` event.
    pub fn send(&self, peer: &NetworkId, msg: PeerMessage) -> bool {
        self.transport.send(peer, msg).is_ok()
    }

    /// Complete the caller's sink with success and record the request.
    pub fn accept_start(&mut self, event: &mut StartCooperateEvent) {
        event.error_sink.complete(Ok(()));
        self.events.start_cooperate(PendingRequest {
            pid: event.pid,
            user_data: event.user_data,
            network_id: event.remote_network_id.clone(),
        });
    }

    /// Complete the caller's sink with `code`; no notification follows.
    pub fn reject_start(&mut self, event: &mut StartCooperateEvent, code: CoordinationErrCode) {
        info!(
            peer = %event.remote_network_id.anonymize(),
            uid = event.uid,
            %code,
            "start rejected"
        );
        event.error_sink.complete(Err(code));
        self.events.busy().end_start();
    }

    /// Drop the pairing and go back to neutral local state. Busy flags
    /// stay with the requests that claimed them.
    pub fn reset_cooperation(&mut self) {
        if let Some(peer) = self.peer.take() {
            info!(peer = %peer.anonymize(), "cooperation reset");
        }
        self.start_device = DeviceId::INVALID;
        self.peer_speeds = None;
        if self.need_freeze_cursor() {
            self.env.input.thaw_cursor();
            self.flag &= !COOPERATE_FLAG_FREEZE_CURSOR;
        }
    }

    pub fn has_local_pointer_device(&self) -> bool {
        self.env.devices.has_local_pointer_device()
    }

    pub fn set_pointer_visibility(&self, visible: bool) {
        debug!(visible, "pointer visibility");
        self.env.input.set_pointer_visibility(visible);
    }

    pub fn freeze_cursor(&self) {
        self.env.input.freeze_cursor();
    }

    pub fn thaw_cursor(&self) {
        self.env.input.thaw_cursor();
    }

    // -- virtual devices ----------------------------------------------------

    /// Mirror the peer's physical devices locally.
    pub fn add_virtual_devices(&mut self, devices: &[DeviceInfo]) {
        if devices.is_empty() {
            return;
        }
        match self.env.devices.add_virtual_input_devices(devices) {
            Ok(ids) => {
                for (id, info) in ids.into_iter().zip(devices) {
                    debug!(%id, dhid = %info.dhid, "virtual device added");
                    self.virtual_devices.insert(id, info.dhid.clone());
                }
            }
            Err(e) => warn!(error = %e, "failed to add virtual input devices"),
        }
    }

    /// Remove the virtual device mirroring `dhid`, if any.
    pub fn remove_virtual_device_by_dhid(&mut self, dhid: &str) {
        let ids: Vec<DeviceId> = self
            .virtual_devices
            .iter()
            .filter(|(_, d)| d.as_str() == dhid)
            .map(|(id, _)| *id)
            .collect();
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            self.virtual_devices.remove(id);
        }
        self.env.devices.remove_virtual_input_devices(&ids);
    }

    pub fn remove_virtual_devices(&mut self) {
        if self.virtual_devices.is_empty() {
            return;
        }
        let ids: Vec<DeviceId> = std::mem::take(&mut self.virtual_devices)
            .into_keys()
            .collect();
        debug!(count = ids.len(), "removing virtual devices");
        self.env.devices.remove_virtual_input_devices(&ids);
    }

    pub fn is_virtual_device(&self, id: DeviceId) -> bool {
        self.virtual_devices.contains_key(&id)
    }

    pub fn virtual_device_ids(&self) -> Vec<DeviceId> {
        self.virtual_devices.keys().copied().collect()
    }

    // -- monitors and observers ---------------------------------------------

    /// Install the pointer monitor and device-removed listener once.
    pub fn add_monitors(&mut self) {
        if self.pointer_monitor.is_none() {
            let sender = self.sender.clone();
            let monitor = self.env.input.add_monitor(Box::new(move |event| {
                if let Err(e) = sender.send(CooperateEvent::InputPointerEvent(event)) {
                    debug!(error = %e, "pointer event dropped");
                }
            }));
            match monitor {
                Ok(id) => {
                    debug!(%id, "pointer monitor installed");
                    self.pointer_monitor = Some(id);
                }
                Err(e) => warn!(error = %e, "failed to install pointer monitor"),
            }
        }
        if self.device_listener.is_none() {
            let sender = self.sender.clone();
            let listener = self.env.input.add_device_listener(Box::new(move |device_id| {
                let event = CooperateEvent::InputDeviceRemoved(InputDeviceRemovedEvent { device_id });
                if let Err(e) = sender.send(event) {
                    debug!(error = %e, "device removal dropped");
                }
            }));
            match listener {
                Ok(id) => self.device_listener = Some(id),
                Err(e) => warn!(error = %e, "failed to install device listener"),
            }
        }
    }

    pub fn remove_monitors(&mut self) {
        if let Some(id) = self.pointer_monitor.take() {
            debug!(%id, "pointer monitor removed");
            self.env.input.remove_monitor(id);
        }
        if let Some(id) = self.device_listener.take() {
            self.env.input.remove_device_listener(id);
        }
    }

    pub fn pointer_monitor(&self) -> Option<MonitorId> {
        self.pointer_monitor
    }

    /// Watch `pid` and enqueue `AppClosed` when it dies.
    pub fn observe_client(&mut self, pid: Pid) {
        if !self.clients.insert(pid) {
            return;
        }
        let sender = self.sender.clone();
        self.env.sessions.add_session_deleted_callback(
            pid,
            Box::new(move |pid| {
                info!(%pid, "client disconnected");
                if let Err(e) = sender.send(CooperateEvent::AppClosed(AppClosedEvent { pid })) {
                    debug!(error = %e, "app-closed dropped");
                }
            }),
        );
    }

    pub fn forget_client(&mut self, pid: Pid) {
        if self.clients.remove(&pid) {
            self.env.sessions.remove_session_deleted_callback(pid);
        }
    }

    pub fn clients(&self) -> impl Iterator<Item = &Pid> {
        self.clients.iter()
    }

    pub fn has_clients(&self) -> bool {
        !self.clients.is_empty()
    }

    pub fn forget_all_clients(&mut self) {
        for pid in std::mem::take(&mut self.clients) {
            self.env.sessions.remove_session_deleted_callback(pid);
        }
    }

    // -- timers ---------------------------------------------------------------

    /// Enqueue `make_event()` once after `delay`.
    pub fn schedule<F>(&self, delay: Duration, make_event: F) -> Result<TimerId, TimerError>
    where
        F: Fn() -> CooperateEvent + Send + 'static,
    {
        let sender = self.sender.clone();
        self.env.timer.add_timer(
            delay,
            1,
            Box::new(move || {
                let event = make_event();
                let kind = event.kind();
                if let Err(e) = sender.send(event) {
                    warn!(%kind, error = %e, "timer event dropped");
                }
            }),
        )
    }

    /// Like [`Context::schedule`], tracked until it fires so shutdown can
    /// cancel it.
    pub fn defer<F>(&mut self, delay: Duration, make_event: F) -> Result<TimerId, TimerError>
    where
        F: Fn() -> CooperateEvent + Send + 'static,
    {
        let seq = {
            let mut deferred = self.deferred_timers.lock();
            deferred.next += 1;
            deferred.next
        };
        let deferred = Arc::clone(&self.deferred_timers);
        let id = self.schedule(delay, move || {
            let event = make_event();
            let mut deferred = deferred.lock();
            if deferred.live.remove(&seq).is_none() {
                deferred.fired.insert(seq);
            }
            event
        })?;
        let mut deferred = self.deferred_timers.lock();
        if !deferred.fired.remove(&seq) {
            deferred.live.insert(seq, id);
        }
        Ok(id)
    }

    pub fn cancel_timer(&self, id: TimerId) {
        match self.env.timer.remove_timer(id) {
            Ok(()) => debug!(%id, "timer cancelled"),
            Err(e) => debug!(%id, error = %e, "timer already gone"),
        }
    }

    pub fn cancel_deferred_timers(&mut self) {
        let live = std::mem::take(&mut self.deferred_timers.lock().live);
        for id in live.into_values() {
            self.cancel_timer(id);
        }
    }

    pub fn deferred_timer_count(&self) -> usize {
        self.deferred_timers.lock().live.len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("local_id", &self.local_id)
            .field("peer", &self.peer)
            .field("start_device", &self.start_device)
            .field("flag", &self.flag)
            .finish_non_exhaustive()
    }
}
