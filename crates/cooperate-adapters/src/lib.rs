//! Collaborator interfaces consumed by the cooperate engine.
//!
//! The engine never talks to the network, the input subsystem or the
//! process manager directly. It goes through the traits defined here,
//! bundled in an [`Environment`] that is built once and shared with the
//! worker thread. All methods are synchronous: they are called from the
//! engine's worker thread, and implementations are expected to bound their
//! own latency (a hung `open_session` stalls the whole engine).
//!
//! Callbacks handed to adapters (pointer monitor, device removal, client
//! death, timers) run on the adapter's own threads and must only enqueue
//! events for the engine.

use std::sync::Arc;
use std::time::Duration;

use cooperate_types::{
    Coordinate, DeviceId, DeviceInfo, DisplayGeometry, InputPointerEvent, NetworkId,
    Notification, PeerMessage, Pid,
};

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod timer;

pub use error::{AdapterError, TimerError};
pub use timer::TokioTimerManager;

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an installed input monitor or device listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonitorId(pub u32);

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type TimerCallback = Box<dyn FnMut() + Send + 'static>;
pub type PointerCallback = Box<dyn Fn(InputPointerEvent) + Send + Sync + 'static>;
pub type DeviceRemovedCallback = Box<dyn Fn(DeviceId) + Send + Sync + 'static>;
pub type SessionDeletedCallback = Box<dyn Fn(Pid) + Send + Sync + 'static>;
/// Receives `(sender, message)` for every inbound peer message.
pub type InboundCallback = Box<dyn Fn(NetworkId, PeerMessage) + Send + Sync + 'static>;

/// Network sessions to peer devices.
pub trait Transport: Send + Sync {
    fn local_network_id(&self) -> NetworkId;

    /// Open (or reuse) a session to `peer`.
    fn open_session(&self, peer: &NetworkId) -> Result<(), AdapterError>;

    fn close_session(&self, peer: &NetworkId);

    fn close_all_sessions(&self);

    fn send(&self, peer: &NetworkId, msg: PeerMessage) -> Result<(), AdapterError>;
}

/// Single-shot or repeating timers.
pub trait TimerService: Send + Sync {
    /// Schedule `callback` every `delay`, `repeat` times (`0` repeats until
    /// removed).
    fn add_timer(
        &self,
        delay: Duration,
        repeat: u32,
        callback: TimerCallback,
    ) -> Result<TimerId, TimerError>;

    fn remove_timer(&self, id: TimerId) -> Result<(), TimerError>;
}

/// Local input subsystem: monitors, pointer visibility and placement.
pub trait InputAdapter: Send + Sync {
    fn add_monitor(&self, callback: PointerCallback) -> Result<MonitorId, AdapterError>;

    fn remove_monitor(&self, id: MonitorId);

    /// Get notified when a local input device goes away.
    fn add_device_listener(
        &self,
        callback: DeviceRemovedCallback,
    ) -> Result<MonitorId, AdapterError>;

    fn remove_device_listener(&self, id: MonitorId);

    fn set_pointer_visibility(&self, visible: bool);

    fn set_pointer_location(&self, pos: Coordinate);

    fn freeze_cursor(&self);

    fn thaw_cursor(&self);

    fn display_size(&self) -> DisplayGeometry;

    fn cursor_position(&self) -> Coordinate;
}

/// Physical and virtual input devices.
pub trait DeviceManager: Send + Sync {
    fn has_local_pointer_device(&self) -> bool;

    /// Create local virtual devices mirroring a peer's physical devices.
    fn add_virtual_input_devices(&self, devices: &[DeviceInfo])
        -> Result<Vec<DeviceId>, AdapterError>;

    fn remove_virtual_input_devices(&self, ids: &[DeviceId]);
}

/// Account and policy checks applied before a start is accepted.
pub trait AccessPolicy: Send + Sync {
    fn check_same_account(&self, peer: &NetworkId) -> bool;

    fn is_allowed(&self, peer: &NetworkId) -> bool;
}

pub trait DragManager: Send + Sync {
    fn is_motion_dragging(&self) -> bool;
}

/// Watches on the remote cooperate switch of online devices.
pub trait DeviceProfile: Send + Sync {
    fn add_watch(&self, network_id: &NetworkId);

    fn remove_watch(&self, network_id: &NetworkId);
}

/// Lifecycle of client processes.
pub trait ClientSessions: Send + Sync {
    fn add_session_deleted_callback(&self, pid: Pid, callback: SessionDeletedCallback);

    fn remove_session_deleted_callback(&self, pid: Pid);
}

/// Delivery of notifications to a client process.
pub trait ClientNotifier: Send + Sync {
    fn notify(&self, pid: Pid, notification: Notification);
}

/// Every collaborator the engine needs, built once at startup.
#[derive(Clone)]
pub struct Environment {
    pub transport: Arc<dyn Transport>,
    pub timer: Arc<dyn TimerService>,
    pub input: Arc<dyn InputAdapter>,
    pub devices: Arc<dyn DeviceManager>,
    pub policy: Arc<dyn AccessPolicy>,
    pub drag: Arc<dyn DragManager>,
    pub profile: Arc<dyn DeviceProfile>,
    pub sessions: Arc<dyn ClientSessions>,
    pub notifier: Arc<dyn ClientNotifier>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}
