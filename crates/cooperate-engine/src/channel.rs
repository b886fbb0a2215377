//! Event channel between producers and the engine worker.
//!
//! Many producers (client API, input monitor, transport receive path,
//! timers) feed one consumer. Sending never blocks: a full queue is retried
//! a bounded number of times, then reported. Events from one producer are
//! delivered in send order; nothing is promised across producers.

use std::time::Duration;

use cooperate_types::CooperateEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_SEND_RETRIES: u32 = 8;

/// Pause between retries on a full queue.
const RETRY_BACKOFF: Duration = Duration::from_micros(200);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("event channel is full")]
    Full,

    #[error("event channel is closed")]
    Closed,
}

/// Producer handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Sender {
    tx: mpsc::Sender<CooperateEvent>,
    retries: u32,
}

impl Sender {
    /// Enqueue `event` without blocking beyond the retry budget.
    pub fn send(&self, event: CooperateEvent) -> Result<(), ChannelError> {
        let mut event = event;
        let mut attempt = 0;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(_)) => return Err(ChannelError::Closed),
                Err(TrySendError::Full(returned)) => {
                    if attempt >= self.retries {
                        tracing::warn!(kind = %returned.kind(), "dropping event, channel full");
                        return Err(ChannelError::Full);
                    }
                    attempt += 1;
                    event = returned;
                    std::thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single consumer.
#[derive(Debug)]
pub struct Receiver {
    rx: mpsc::Receiver<CooperateEvent>,
}

impl Receiver {
    /// Wait for the next event; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<CooperateEvent> {
        self.rx.recv().await
    }

    /// Blocking variant for the worker thread. Must not be called from
    /// inside an async context.
    pub fn blocking_recv(&mut self) -> Option<CooperateEvent> {
        self.rx.blocking_recv()
    }

    /// Next event if one is queued.
    pub fn try_recv(&mut self) -> Option<CooperateEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop accepting new events. Queued events can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Create a channel with room for `capacity` queued events.
#[must_use]
pub fn channel(capacity: usize, retries: u32) -> (Sender, Receiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Sender { tx, retries }, Receiver { rx })
}
