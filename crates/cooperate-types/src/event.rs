//! Coordination events.
//!
//! Every producer (client API, input monitor, transport receive path,
//! device manager, timers) talks to the engine by sending a
//! [`CooperateEvent`]. Each variant carries exactly one payload type, so a
//! handler can never read the wrong payload for a tag.

use tokio::sync::oneshot;

use crate::device::{DeviceInfo, HotPlugKind};
use crate::error::CoordinationErrCode;
use crate::geometry::{Coordinate, MouseLocation};
use crate::id::{DeviceId, NetworkId, Pid};

/// Completion slot for the synchronous part of a client request.
///
/// Completed at most once; later completions are ignored. A sink created
/// with [`ErrorSink::none`] swallows its result.
#[derive(Debug, Default)]
pub struct ErrorSink {
    tx: Option<oneshot::Sender<Result<(), CoordinationErrCode>>>,
}

impl ErrorSink {
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Result<(), CoordinationErrCode>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    #[must_use]
    pub fn none() -> Self {
        Self { tx: None }
    }

    /// Deliver `result`. Returns `false` when the sink was already used.
    pub fn complete(&mut self, result: Result<(), CoordinationErrCode>) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The caller may have stopped waiting.
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Reply slot for a state query.
pub type StateSink = oneshot::Sender<bool>;

/// Display placement requested by `start_with_options`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CooperateOptions {
    pub display_x: i32,
    pub display_y: i32,
    pub display_id: i32,
}

/// Pointer action reported by the local input monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Move,
    ButtonDown,
    ButtonUp,
    Axis,
    EnterWindow,
    LeaveWindow,
    PullIn,
    PullOut,
    Other,
}

impl PointerAction {
    /// Window bookkeeping actions that never indicate user activity.
    #[must_use]
    pub fn is_window_transition(self) -> bool {
        matches!(
            self,
            Self::EnterWindow | Self::LeaveWindow | Self::PullIn | Self::PullOut
        )
    }
}

/// Origin of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Mouse,
    Touchpad,
    Touchscreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterListenerEvent {
    pub pid: Pid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnregisterListenerEvent {
    pub pid: Pid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnableCooperateEvent {
    pub pid: Pid,
    pub user_data: i32,
    pub token_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisableCooperateEvent {
    pub pid: Pid,
    pub user_data: i32,
}

/// Local request to begin cooperation with `remote_network_id`.
#[derive(Debug)]
pub struct StartCooperateEvent {
    pub pid: Pid,
    pub user_data: i32,
    pub remote_network_id: NetworkId,
    pub start_device_id: DeviceId,
    /// Correlates log lines of one request across devices.
    pub uid: u32,
    pub error_sink: ErrorSink,
}

#[derive(Debug)]
pub struct StartWithOptionsEvent {
    pub start: StartCooperateEvent,
    pub options: CooperateOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopCooperateEvent {
    pub pid: Pid,
    pub user_data: i32,
    /// Also tear down every transport session, not only the peer's.
    pub is_unchained: bool,
}

#[derive(Debug)]
pub struct GetCooperateStateEvent {
    pub pid: Pid,
    pub user_data: i32,
    pub network_id: NetworkId,
    pub reply: Option<StateSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCooperateFlagEvent {
    pub mask: u32,
    pub flag: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppClosedEvent {
    pub pid: Pid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPointerEvent {
    pub device_id: DeviceId,
    pub pointer_action: PointerAction,
    pub source_type: SourceType,
    /// Display position in pixels.
    pub position: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDeviceRemovedEvent {
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardOnlineEvent {
    pub network_id: NetworkId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardOfflineEvent {
    pub network_id: NetworkId,
}

/// The remote cooperate switch of `network_id` was toggled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchChangedEvent {
    pub network_id: NetworkId,
    pub normal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOpenedEvent {
    pub network_id: NetworkId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClosedEvent {
    pub network_id: NetworkId,
}

/// A peer asks this device to take over input.
///
/// `network_id` is the sender, `origin_network_id` the device whose input
/// is being handed over (they differ after a relay).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStartEvent {
    pub network_id: NetworkId,
    pub origin_network_id: NetworkId,
    /// Normalized cursor position on the sender's display.
    pub cursor_pos: Coordinate,
    pub pointer_speed: i32,
    pub touchpad_speed: i32,
    pub uid: u32,
    pub options: Option<CooperateOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStartResponseEvent {
    pub network_id: NetworkId,
    pub normal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStopEvent {
    pub network_id: NetworkId,
}

/// The peer we were sending input to gives it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComeBackEvent {
    pub network_id: NetworkId,
    pub origin_network_id: NetworkId,
    pub cursor_pos: Coordinate,
    pub options: Option<CooperateOptions>,
}

/// The peer asks this device to connect directly to `target_network_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCooperateEvent {
    pub network_id: NetworkId,
    pub target_network_id: NetworkId,
    pub pointer_speed: i32,
    pub touchpad_speed: i32,
    pub uid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCooperateFinishedEvent {
    pub network_id: NetworkId,
    pub target_network_id: NetworkId,
    pub normal: bool,
    pub uid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInputDeviceSyncEvent {
    pub network_id: NetworkId,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHotPlugEvent {
    pub network_id: NetworkId,
    pub kind: HotPlugKind,
    pub device: DeviceInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterHotAreaListenerEvent {
    pub pid: Pid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnregisterHotAreaListenerEvent {
    pub pid: Pid,
}

/// A client wants the cursor location of `network_id`, which may be the
/// local device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterEventListenerEvent {
    pub pid: Pid,
    pub network_id: NetworkId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterEventListenerEvent {
    pub pid: Pid,
    pub network_id: NetworkId,
}

/// `network_id` subscribes to, or unsubscribes from, our cursor location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseLocationSubscriptionEvent {
    pub network_id: NetworkId,
}

/// Answer of `network_id` to one of our (un)subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseLocationReplyEvent {
    pub network_id: NetworkId,
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMouseLocationEvent {
    pub network_id: NetworkId,
    pub location: MouseLocation,
}

/// Tagged union of everything the engine consumes.
#[derive(Debug)]
pub enum CooperateEvent {
    RegisterListener(RegisterListenerEvent),
    UnregisterListener(UnregisterListenerEvent),
    Enable(EnableCooperateEvent),
    Disable(DisableCooperateEvent),
    Start(StartCooperateEvent),
    StartWithOptions(StartWithOptionsEvent),
    Stop(StopCooperateEvent),
    GetCooperateState(GetCooperateStateEvent),
    UpdateCooperateFlag(UpdateCooperateFlagEvent),
    AppClosed(AppClosedEvent),
    InputPointerEvent(InputPointerEvent),
    InputDeviceRemoved(InputDeviceRemovedEvent),
    BoardOnline(BoardOnlineEvent),
    BoardOffline(BoardOfflineEvent),
    SwitchChanged(SwitchChangedEvent),
    SessionOpened(SessionOpenedEvent),
    SessionClosed(SessionClosedEvent),
    RemoteStart(RemoteStartEvent),
    RemoteStartResponse(RemoteStartResponseEvent),
    RemoteStop(RemoteStopEvent),
    ComeBack(ComeBackEvent),
    RelayCooperate(RelayCooperateEvent),
    RelayCooperateFinished(RelayCooperateFinishedEvent),
    RemoteInputDeviceSync(RemoteInputDeviceSyncEvent),
    RemoteHotPlug(RemoteHotPlugEvent),
    RegisterHotAreaListener(RegisterHotAreaListenerEvent),
    UnregisterHotAreaListener(UnregisterHotAreaListenerEvent),
    RegisterEventListener(RegisterEventListenerEvent),
    UnregisterEventListener(UnregisterEventListenerEvent),
    SubscribeMouseLocation(MouseLocationSubscriptionEvent),
    UnsubscribeMouseLocation(MouseLocationSubscriptionEvent),
    ReplySubscribeMouseLocation(MouseLocationReplyEvent),
    ReplyUnsubscribeMouseLocation(MouseLocationReplyEvent),
    RemoteMouseLocation(RemoteMouseLocationEvent),
    Quit,
}

/// Payload-free tag of a [`CooperateEvent`], used in logs and dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooperateEventType {
    RegisterListener,
    UnregisterListener,
    Enable,
    Disable,
    Start,
    StartWithOptions,
    Stop,
    GetCooperateState,
    UpdateCooperateFlag,
    AppClosed,
    InputPointerEvent,
    InputDeviceRemoved,
    BoardOnline,
    BoardOffline,
    SwitchChanged,
    SessionOpened,
    SessionClosed,
    RemoteStart,
    RemoteStartResponse,
    RemoteStop,
    ComeBack,
    RelayCooperate,
    RelayCooperateFinished,
    RemoteInputDeviceSync,
    RemoteHotPlug,
    RegisterHotAreaListener,
    UnregisterHotAreaListener,
    RegisterEventListener,
    UnregisterEventListener,
    SubscribeMouseLocation,
    UnsubscribeMouseLocation,
    ReplySubscribeMouseLocation,
    ReplyUnsubscribeMouseLocation,
    RemoteMouseLocation,
    Quit,
}

impl CooperateEvent {
    #[must_use]
    pub fn kind(&self) -> CooperateEventType {
        match self {
            Self::RegisterListener(_) => CooperateEventType::RegisterListener,
            Self::UnregisterListener(_) => CooperateEventType::UnregisterListener,
            Self::Enable(_) => CooperateEventType::Enable,
            Self::Disable(_) => CooperateEventType::Disable,
            Self::Start(_) => CooperateEventType::Start,
            Self::StartWithOptions(_) => CooperateEventType::StartWithOptions,
            Self::Stop(_) => CooperateEventType::Stop,
            Self::GetCooperateState(_) => CooperateEventType::GetCooperateState,
            Self::UpdateCooperateFlag(_) => CooperateEventType::UpdateCooperateFlag,
            Self::AppClosed(_) => CooperateEventType::AppClosed,
            Self::InputPointerEvent(_) => CooperateEventType::InputPointerEvent,
            Self::InputDeviceRemoved(_) => CooperateEventType::InputDeviceRemoved,
            Self::BoardOnline(_) => CooperateEventType::BoardOnline,
            Self::BoardOffline(_) => CooperateEventType::BoardOffline,
            Self::SwitchChanged(_) => CooperateEventType::SwitchChanged,
            Self::SessionOpened(_) => CooperateEventType::SessionOpened,
            Self::SessionClosed(_) => CooperateEventType::SessionClosed,
            Self::RemoteStart(_) => CooperateEventType::RemoteStart,
            Self::RemoteStartResponse(_) => CooperateEventType::RemoteStartResponse,
            Self::RemoteStop(_) => CooperateEventType::RemoteStop,
            Self::ComeBack(_) => CooperateEventType::ComeBack,
            Self::RelayCooperate(_) => CooperateEventType::RelayCooperate,
            Self::RelayCooperateFinished(_) => CooperateEventType::RelayCooperateFinished,
            Self::RemoteInputDeviceSync(_) => CooperateEventType::RemoteInputDeviceSync,
            Self::RemoteHotPlug(_) => CooperateEventType::RemoteHotPlug,
            Self::RegisterHotAreaListener(_) => CooperateEventType::RegisterHotAreaListener,
            Self::UnregisterHotAreaListener(_) => CooperateEventType::UnregisterHotAreaListener,
            Self::RegisterEventListener(_) => CooperateEventType::RegisterEventListener,
            Self::UnregisterEventListener(_) => CooperateEventType::UnregisterEventListener,
            Self::SubscribeMouseLocation(_) => CooperateEventType::SubscribeMouseLocation,
            Self::UnsubscribeMouseLocation(_) => CooperateEventType::UnsubscribeMouseLocation,
            Self::ReplySubscribeMouseLocation(_) => {
                CooperateEventType::ReplySubscribeMouseLocation
            }
            Self::ReplyUnsubscribeMouseLocation(_) => {
                CooperateEventType::ReplyUnsubscribeMouseLocation
            }
            Self::RemoteMouseLocation(_) => CooperateEventType::RemoteMouseLocation,
            Self::Quit => CooperateEventType::Quit,
        }
    }

    /// Network id the event refers to, if it names a remote device.
    #[must_use]
    pub fn network_id(&self) -> Option<&NetworkId> {
        match self {
            Self::Start(e) => Some(&e.remote_network_id),
            Self::StartWithOptions(e) => Some(&e.start.remote_network_id),
            Self::GetCooperateState(e) => Some(&e.network_id),
            Self::BoardOnline(e) => Some(&e.network_id),
            Self::BoardOffline(e) => Some(&e.network_id),
            Self::SwitchChanged(e) => Some(&e.network_id),
            Self::SessionOpened(e) => Some(&e.network_id),
            Self::SessionClosed(e) => Some(&e.network_id),
            Self::RemoteStart(e) => Some(&e.network_id),
            Self::RemoteStartResponse(e) => Some(&e.network_id),
            Self::RemoteStop(e) => Some(&e.network_id),
            Self::ComeBack(e) => Some(&e.network_id),
            Self::RelayCooperate(e) => Some(&e.network_id),
            Self::RelayCooperateFinished(e) => Some(&e.network_id),
            Self::RemoteInputDeviceSync(e) => Some(&e.network_id),
            Self::RemoteHotPlug(e) => Some(&e.network_id),
            Self::RegisterEventListener(e) => Some(&e.network_id),
            Self::UnregisterEventListener(e) => Some(&e.network_id),
            Self::SubscribeMouseLocation(e) | Self::UnsubscribeMouseLocation(e) => {
                Some(&e.network_id)
            }
            Self::ReplySubscribeMouseLocation(e) | Self::ReplyUnsubscribeMouseLocation(e) => {
                Some(&e.network_id)
            }
            Self::RemoteMouseLocation(e) => Some(&e.network_id),
            _ => None,
        }
    }
}

impl std::fmt::Display for CooperateEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
