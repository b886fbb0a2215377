//! Messages exchanged with peer devices and notifications sent to clients.
//!
//! Encoding of [`PeerMessage`] on the wire belongs to the transport; the
//! engine only builds and consumes the typed values.

use serde::{Deserialize, Serialize};

use crate::device::{DeviceInfo, HotPlugKind};
use crate::error::CoordinationErrCode;
use crate::event::CooperateOptions;
use crate::geometry::{Coordinate, HotArea, MouseLocation};
use crate::id::NetworkId;

/// Protocol messages sent to a peer through the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Hand input over to the receiver.
    StartCooperate {
        origin: NetworkId,
        /// Normalized cursor position.
        cursor_pos: Coordinate,
        pointer_speed: i32,
        touchpad_speed: i32,
        uid: u32,
        options: Option<CooperateOptions>,
    },

    /// Answer to `StartCooperate`.
    StartCooperateResponse { normal: bool },

    /// End the current session.
    StopCooperate,

    /// Give input back to the device it came from.
    ComeBack {
        origin: NetworkId,
        cursor_pos: Coordinate,
        options: Option<CooperateOptions>,
    },

    /// Ask the receiver to connect directly to `target`.
    RelayCooperate {
        target: NetworkId,
        pointer_speed: i32,
        touchpad_speed: i32,
        uid: u32,
    },

    /// Outcome of a `RelayCooperate`.
    RelayCooperateFinished {
        target: NetworkId,
        normal: bool,
        uid: u32,
    },

    /// Full list of the sender's physical input devices.
    InputDeviceSync { devices: Vec<DeviceInfo> },

    /// A physical input device of the sender was added or removed.
    HotPlug { kind: HotPlugKind, device: DeviceInfo },

    /// Ask the receiver to stream its cursor location to the sender.
    SubscribeMouseLocation,

    UnsubscribeMouseLocation,

    /// Answer to `SubscribeMouseLocation`.
    ReplySubscribeMouseLocation { result: bool },

    /// Answer to `UnsubscribeMouseLocation`.
    ReplyUnsubscribeMouseLocation { result: bool },

    /// Current cursor location of the sender.
    MouseLocation { location: MouseLocation },
}

impl PeerMessage {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartCooperate { .. } => "StartCooperate",
            Self::StartCooperateResponse { .. } => "StartCooperateResponse",
            Self::StopCooperate => "StopCooperate",
            Self::ComeBack { .. } => "ComeBack",
            Self::RelayCooperate { .. } => "RelayCooperate",
            Self::RelayCooperateFinished { .. } => "RelayCooperateFinished",
            Self::InputDeviceSync { .. } => "InputDeviceSync",
            Self::HotPlug { .. } => "HotPlug",
            Self::SubscribeMouseLocation => "SubscribeMouseLocation",
            Self::UnsubscribeMouseLocation => "UnsubscribeMouseLocation",
            Self::ReplySubscribeMouseLocation { .. } => "ReplySubscribeMouseLocation",
            Self::ReplyUnsubscribeMouseLocation { .. } => "ReplyUnsubscribeMouseLocation",
            Self::MouseLocation { .. } => "MouseLocation",
        }
    }
}

/// Logical cooperation status published to listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CooperateStatus {
    #[default]
    Free,
    /// Local input is being sent to the peer.
    Out,
    /// The peer's input is being received.
    In,
}

impl std::fmt::Display for CooperateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Out => write!(f, "out"),
            Self::In => write!(f, "in"),
        }
    }
}

/// Milestones reported to registered listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinationMessage {
    PrepareSuccess,
    UnprepareSuccess,
    /// A remote device started sending input here.
    Activate,
    ActivateSuccess,
    ActivateFail,
    DeactivateSuccess,
    DeactivateFail,
    SessionClosed,
    /// The peer handed input back to this device.
    ComeBack,
    /// Cooperation moved on to another device.
    Relay,
    /// Every session was torn down by an unchained stop.
    Unchain,
}

/// Everything the engine reports to clients through the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StateChanged {
        status: CooperateStatus,
    },
    Message {
        network_id: NetworkId,
        msg: CoordinationMessage,
    },
    /// Completion of a `start` request.
    StartResult {
        user_data: i32,
        network_id: NetworkId,
        result: Result<(), CoordinationErrCode>,
    },
    /// Completion of a `stop` request.
    StopResult {
        user_data: i32,
        network_id: NetworkId,
        result: Result<(), CoordinationErrCode>,
    },
    /// Reply to a `get_state` request.
    State {
        user_data: i32,
        network_id: NetworkId,
        cooperating: bool,
    },
    /// Remote cooperate switch of `network_id` changed.
    ProfileChanged {
        network_id: NetworkId,
        normal: bool,
    },
    /// The local cursor entered, moved within, or left a border region.
    HotArea {
        position: Coordinate,
        area: HotArea,
        is_edge: bool,
    },
    /// Cursor location of `network_id`, for clients that asked for it.
    MouseLocation {
        network_id: NetworkId,
        location: MouseLocation,
    },
}
