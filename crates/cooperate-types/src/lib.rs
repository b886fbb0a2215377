//! Shared types for cooperate.
//!
//! This crate contains all types shared across the cooperate workspace:
//! device identities, display geometry, the coordination event union
//! consumed by the engine, messages exchanged with peer devices, and the
//! notifications delivered to clients.

pub mod device;
pub mod error;
pub mod event;
pub mod flag;
pub mod geometry;
pub mod id;
pub mod message;

pub use device::{DeviceCapability, DeviceInfo, HotPlugKind};
pub use error::CoordinationErrCode;
pub use event::{
    AppClosedEvent, BoardOfflineEvent, BoardOnlineEvent, ComeBackEvent, CooperateEvent,
    CooperateEventType, CooperateOptions, DisableCooperateEvent, EnableCooperateEvent,
    ErrorSink, GetCooperateStateEvent, InputDeviceRemovedEvent, InputPointerEvent,
    MouseLocationReplyEvent, MouseLocationSubscriptionEvent, PointerAction,
    RegisterEventListenerEvent, RegisterHotAreaListenerEvent, RegisterListenerEvent,
    RelayCooperateEvent, RelayCooperateFinishedEvent, RemoteHotPlugEvent,
    RemoteInputDeviceSyncEvent, RemoteMouseLocationEvent, RemoteStartEvent,
    RemoteStartResponseEvent, RemoteStopEvent, SessionClosedEvent, SessionOpenedEvent,
    SourceType, StartCooperateEvent, StartWithOptionsEvent, StateSink, StopCooperateEvent,
    SwitchChangedEvent, UnregisterEventListenerEvent, UnregisterHotAreaListenerEvent,
    UnregisterListenerEvent, UpdateCooperateFlagEvent,
};
pub use flag::{COOPERATE_FLAG_FREEZE_CURSOR, COOPERATE_FLAG_HIDE_CURSOR};
pub use geometry::{Coordinate, DisplayGeometry, HotArea, MouseLocation};
pub use id::{DeviceId, NetworkId, Pid};
pub use message::{CoordinationMessage, CooperateStatus, Notification, PeerMessage};
