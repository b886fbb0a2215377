//! Public service: owns the worker thread and exposes the client API.
//!
//! Every call turns into a [`CooperateEvent`] on the engine channel. The
//! worker drains the channel on one OS thread and is the only owner of the
//! state machine and its context; callers only share the listener
//! registry, the busy flags, the status watch and the latest snapshot.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cooperate_adapters::{Environment, InboundCallback};
use cooperate_types::{
    CooperateEvent, CooperateOptions, CooperateStatus, DeviceId, DisableCooperateEvent,
    EnableCooperateEvent, ErrorSink, GetCooperateStateEvent, NetworkId, Pid,
    RegisterEventListenerEvent, RegisterHotAreaListenerEvent, RegisterListenerEvent,
    StartCooperateEvent, StartWithOptionsEvent, StopCooperateEvent, UnregisterEventListenerEvent,
    UnregisterHotAreaListenerEvent, UnregisterListenerEvent, UpdateCooperateFlagEvent,
};
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};

use crate::channel::{channel, Receiver, Sender};
use crate::config::Config;
use crate::context::Context;
use crate::dump::Snapshot;
use crate::error::CooperateError;
use crate::event_manager::{BusyFlags, ListenerRegistry};
use crate::state_machine::StateMachine;
use crate::transport_handler::TransportHandler;

const WORKER_NAME: &str = "cooperate-worker";

/// Parts moved onto the worker thread.
struct Worker {
    machine: StateMachine,
    ctx: Context,
    rx: Receiver,
}

/// A local start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartParams {
    pub pid: Pid,
    pub user_data: i32,
    pub remote_network_id: NetworkId,
    pub start_device_id: DeviceId,
}

pub struct Cooperate {
    sender: Sender,
    local_id: NetworkId,
    listeners: ListenerRegistry,
    busy: Arc<BusyFlags>,
    status_rx: watch::Receiver<CooperateStatus>,
    snapshot: Arc<Mutex<Snapshot>>,
    transport: TransportHandler,
    next_uid: AtomicU32,
    idle: Option<Worker>,
    handle: Option<JoinHandle<()>>,
}

impl Cooperate {
    /// Build the engine. Nothing runs until [`Cooperate::start_worker`].
    #[must_use]
    pub fn new(config: &Config, env: Environment) -> Self {
        let (sender, rx) = channel(config.engine.channel_capacity, config.engine.send_retries);
        let ctx = Context::new(env, sender.clone(), config);
        let machine = StateMachine::new();
        info!(local = %ctx.local_id().anonymize(), "cooperate engine created");
        Self {
            local_id: ctx.local_id().clone(),
            listeners: ctx.events.listeners().clone(),
            busy: Arc::clone(ctx.events.busy()),
            status_rx: machine.status_receiver(),
            snapshot: Arc::new(Mutex::new(Snapshot::capture(&machine, &ctx))),
            transport: ctx.transport().clone(),
            next_uid: AtomicU32::new(1),
            sender,
            idle: Some(Worker { machine, ctx, rx }),
            handle: None,
        }
    }

    /// Spawn the worker thread.
    pub fn start_worker(&mut self) -> Result<(), CooperateError> {
        let worker = self.idle.take().ok_or(CooperateError::AlreadyRunning)?;
        let snapshot = Arc::clone(&self.snapshot);
        let handle = std::thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run(worker, &snapshot))
            .map_err(CooperateError::Spawn)?;
        self.handle = Some(handle);
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn local_network_id(&self) -> &NetworkId {
        &self.local_id
    }

    pub fn register_listener(&self, pid: Pid) -> Result<(), CooperateError> {
        self.send(CooperateEvent::RegisterListener(RegisterListenerEvent { pid }))
    }

    pub fn unregister_listener(&self, pid: Pid) -> Result<(), CooperateError> {
        self.send(CooperateEvent::UnregisterListener(UnregisterListenerEvent { pid }))
    }

    pub fn register_hot_area_listener(&self, pid: Pid) -> Result<(), CooperateError> {
        self.send(CooperateEvent::RegisterHotAreaListener(
            RegisterHotAreaListenerEvent { pid },
        ))
    }

    pub fn unregister_hot_area_listener(&self, pid: Pid) -> Result<(), CooperateError> {
        self.send(CooperateEvent::UnregisterHotAreaListener(
            UnregisterHotAreaListenerEvent { pid },
        ))
    }

    /// Report the cursor of `network_id` to `pid`; an empty id means the
    /// local device.
    pub fn register_mouse_listener(
        &self,
        pid: Pid,
        network_id: NetworkId,
    ) -> Result<(), CooperateError> {
        self.send(CooperateEvent::RegisterEventListener(
            RegisterEventListenerEvent { pid, network_id },
        ))
    }

    pub fn unregister_mouse_listener(
        &self,
        pid: Pid,
        network_id: NetworkId,
    ) -> Result<(), CooperateError> {
        self.send(CooperateEvent::UnregisterEventListener(
            UnregisterEventListenerEvent { pid, network_id },
        ))
    }

    #[must_use]
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn enable(&self, pid: Pid, user_data: i32, token_id: u64) -> Result<(), CooperateError> {
        self.send(CooperateEvent::Enable(EnableCooperateEvent {
            pid,
            user_data,
            token_id,
        }))
    }

    pub fn disable(&self, pid: Pid, user_data: i32) -> Result<(), CooperateError> {
        self.send(CooperateEvent::Disable(DisableCooperateEvent { pid, user_data }))
    }

    /// Ask to hand local input to `params.remote_network_id`.
    ///
    /// Resolves once the request is validated; the session's own outcome
    /// arrives later as a `StartResult` notification.
    pub async fn start(&self, params: StartParams) -> Result<(), CooperateError> {
        self.submit_start(params, None).await
    }

    /// Like [`Cooperate::start`], placing the peer's cursor at an explicit
    /// display position.
    pub async fn start_with_options(
        &self,
        params: StartParams,
        options: CooperateOptions,
    ) -> Result<(), CooperateError> {
        self.submit_start(params, Some(options)).await
    }

    /// End the current cooperation. The result arrives as a `StopResult`
    /// notification.
    pub fn stop(&self, pid: Pid, user_data: i32, is_unchained: bool) -> Result<(), CooperateError> {
        if !self.busy.try_begin_stop() {
            debug!(%pid, "stop rejected, another stop in progress");
            return Err(CooperateError::Busy("stop"));
        }
        let event = CooperateEvent::Stop(StopCooperateEvent {
            pid,
            user_data,
            is_unchained,
        });
        self.send(event).map_err(|e| {
            self.busy.end_stop();
            e
        })
    }

    /// Whether the engine is cooperating, with `network_id` when it is not
    /// empty.
    pub async fn get_state(
        &self,
        pid: Pid,
        user_data: i32,
        network_id: NetworkId,
    ) -> Result<bool, CooperateError> {
        self.ensure_running()?;
        let (tx, rx) = oneshot::channel();
        self.send(CooperateEvent::GetCooperateState(GetCooperateStateEvent {
            pid,
            user_data,
            network_id,
            reply: Some(tx),
        }))?;
        rx.await.map_err(|_| CooperateError::NotRunning)
    }

    pub fn update_cooperate_flag(&self, mask: u32, flag: u32) -> Result<(), CooperateError> {
        self.send(CooperateEvent::UpdateCooperateFlag(UpdateCooperateFlagEvent {
            mask,
            flag,
        }))
    }

    /// Write a human-readable dump of the engine state as of the last
    /// processed event.
    pub fn dump<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let snapshot = self.snapshot.lock().clone();
        snapshot.render(writer)
    }

    #[must_use]
    pub fn status(&self) -> CooperateStatus {
        *self.status_rx.borrow()
    }

    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<CooperateStatus> {
        self.status_rx.clone()
    }

    /// Producer handle for collaborators that feed events directly.
    #[must_use]
    pub fn event_sender(&self) -> Sender {
        self.sender.clone()
    }

    #[must_use]
    pub fn transport_handler(&self) -> &TransportHandler {
        &self.transport
    }

    /// Callback for a transport to deliver inbound peer messages.
    #[must_use]
    pub fn inbound_callback(&self) -> InboundCallback {
        self.transport.inbound_callback()
    }

    /// Stop the worker. Events still queued behind `Quit` are discarded.
    pub fn shutdown(&mut self) -> Result<(), CooperateError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if let Err(e) = self.sender.send(CooperateEvent::Quit) {
            debug!(error = %e, "quit not delivered, worker already gone");
        }
        handle.join().map_err(|_| {
            error!("cooperate worker panicked");
            CooperateError::NotRunning
        })
    }

    async fn submit_start(
        &self,
        params: StartParams,
        options: Option<CooperateOptions>,
    ) -> Result<(), CooperateError> {
        self.ensure_running()?;
        if !self.busy.try_begin_start() {
            debug!(pid = %params.pid, "start rejected, another start in progress");
            return Err(CooperateError::Busy("start"));
        }
        let uid = self.next_uid.fetch_add(1, Ordering::Relaxed);
        let (error_sink, rx) = ErrorSink::new();
        let start = StartCooperateEvent {
            pid: params.pid,
            user_data: params.user_data,
            remote_network_id: params.remote_network_id,
            start_device_id: params.start_device_id,
            uid,
            error_sink,
        };
        let event = match options {
            Some(options) => {
                CooperateEvent::StartWithOptions(StartWithOptionsEvent { start, options })
            }
            None => CooperateEvent::Start(start),
        };
        if let Err(e) = self.send(event) {
            self.busy.end_start();
            return Err(e);
        }
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(code)) => Err(CooperateError::Rejected(code)),
            Err(_) => Err(CooperateError::NotRunning),
        }
    }

    fn ensure_running(&self) -> Result<(), CooperateError> {
        if self.handle.is_some() {
            Ok(())
        } else {
            Err(CooperateError::NotRunning)
        }
    }

    fn send(&self, event: CooperateEvent) -> Result<(), CooperateError> {
        self.sender.send(event).map_err(CooperateError::from)
    }
}

impl Drop for Cooperate {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "shutdown on drop failed");
        }
    }
}

fn run(mut worker: Worker, snapshot: &Mutex<Snapshot>) {
    info!(local = %worker.ctx.local_id().anonymize(), "cooperate worker started");
    while let Some(event) = worker.rx.blocking_recv() {
        let quit = matches!(event, CooperateEvent::Quit);
        worker.machine.on_event(&mut worker.ctx, event);
        *snapshot.lock() = Snapshot::capture(&worker.machine, &worker.ctx);
        if quit {
            break;
        }
    }
    worker.rx.close();
    let discarded = std::iter::from_fn(|| worker.rx.try_recv()).count();
    if discarded > 0 {
        debug!(discarded, "events discarded after quit");
    }
    info!("cooperate worker stopped");
}

#[cfg(test)]
mod tests {
    use cooperate_adapters::mock::MockEnvironment;

    use super::*;

    #[test]
    fn worker_starts_once() {
        let mocks = MockEnvironment::new("A");
        let mut coop = Cooperate::new(&Config::default(), mocks.environment());
        assert!(!coop.is_running());
        coop.start_worker().unwrap();
        assert!(matches!(
            coop.start_worker(),
            Err(CooperateError::AlreadyRunning)
        ));
        coop.shutdown().unwrap();
        assert!(!coop.is_running());
    }

    #[test]
    fn second_stop_is_busy_without_traffic() {
        let mocks = MockEnvironment::new("A");
        let coop = Cooperate::new(&Config::default(), mocks.environment());
        coop.stop(Pid(1), 1, false).unwrap();
        assert!(matches!(
            coop.stop(Pid(1), 2, false),
            Err(CooperateError::Busy("stop"))
        ));
    }

    #[test]
    fn dump_before_start_shows_idle_engine() {
        let mocks = MockEnvironment::new("A");
        let coop = Cooperate::new(&Config::default(), mocks.environment());
        let mut out = Vec::new();
        coop.dump(&mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("cooperate state: free"));
        assert_eq!(coop.status(), CooperateStatus::Free);
    }
}
