//! Error codes reported to clients of the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Definitive outcome codes delivered through a caller's error sink or a
/// start/stop result notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum CoordinationErrCode {
    #[error("cooperation is not allowed while a motion drag is in progress")]
    NotAllowedDuringMotionDrag,

    #[error("cooperation target is the local device")]
    UnexpectedStartCall,

    #[error("peer does not belong to the same account")]
    NotTrusted,

    #[error("cooperation is not allowed by policy")]
    NotAllowed,

    #[error("failed to open a session to the peer")]
    OpenSessionFailed,

    #[error("failed to send a packet to the peer")]
    SendPacketFailed,

    #[error("relay to the target device failed")]
    RelayFailed,

    #[error("another request is still in progress")]
    Busy,

    #[error("request was cancelled")]
    Cancelled,

    #[error("already sending input to a peer")]
    AlreadyCooperating,
}
