//! Adapter errors.

use cooperate_types::NetworkId;
use thiserror::Error;

use crate::TimerId;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to open session to {0}")]
    OpenSession(NetworkId),

    #[error("failed to send {kind} to {peer}")]
    Send { peer: NetworkId, kind: &'static str },

    #[error("no session with {0}")]
    NoSession(NetworkId),

    #[error("failed to install input monitor: {0}")]
    Monitor(String),

    #[error("backend not available on this platform")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("too many live timers (max {0})")]
    Exhausted(usize),

    #[error("timer {0} not found")]
    NotFound(TimerId),

    #[error("timer runtime has shut down")]
    Shutdown,
}
