//! Engine errors.

use cooperate_adapters::{AdapterError, TimerError};
use cooperate_types::CoordinationErrCode;
use thiserror::Error;

use crate::channel::ChannelError;

#[derive(Debug, Error)]
pub enum CooperateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("another {0} request is still in progress")]
    Busy(&'static str),

    #[error("worker already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("request rejected: {0}")]
    Rejected(#[from] CoordinationErrCode),

    #[error("event channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
