//! Coordination engine for cooperate.
//!
//! Hands pointer and keyboard focus between networked devices. A single
//! worker thread drains the event channel and drives the Free / Out / In
//! state machine, including the relay handoff to a third device. Clients
//! talk to it through [`Cooperate`].

pub mod channel;
pub mod config;
pub mod context;
pub mod cooperate;
pub mod dump;
pub mod error;
pub mod event_manager;
pub mod hot_area;
pub mod mouse_location;
pub mod setup;
pub mod state_machine;
pub mod states;
pub mod transport_handler;

#[cfg(test)]
mod testing;

pub use channel::{channel, ChannelError, Receiver, Sender};
pub use config::Config;
pub use context::Context;
pub use cooperate::{Cooperate, StartParams};
pub use dump::Snapshot;
pub use error::CooperateError;
pub use event_manager::{BusyFlags, CallKind, EventManager, ListenerRegistry, PendingRequest};
pub use hot_area::HotAreaWatcher;
pub use mouse_location::MouseLocationHub;
pub use state_machine::StateMachine;
pub use transport_handler::TransportHandler;
