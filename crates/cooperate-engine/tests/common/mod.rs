//! Shared helpers for the engine integration tests.
#![allow(dead_code)]

use std::time::Duration;

use cooperate_adapters::mock::MockEnvironment;
use cooperate_engine::{channel, Config, Context, Receiver, StateMachine};
use cooperate_types::{
    Coordinate, CoordinationErrCode, CooperateEvent, CooperateStatus, DeviceId, ErrorSink,
    NetworkId, Pid, RemoteStartEvent, StartCooperateEvent, StopCooperateEvent,
};
use tokio::sync::{oneshot, watch};
use tracing_subscriber::EnvFilter;

pub const CLIENT: Pid = Pid(100);

pub type SinkReceiver = oneshot::Receiver<Result<(), CoordinationErrCode>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// One engine driven synchronously on the test thread, with mock
/// collaborators and a manual timer.
pub struct Rig {
    pub machine: StateMachine,
    pub ctx: Context,
    pub rx: Receiver,
    pub mocks: MockEnvironment,
}

impl Rig {
    pub fn new(local: &str) -> Self {
        init_tracing();
        let mocks = MockEnvironment::new(local);
        let (tx, rx) = channel(64, 0);
        let ctx = Context::new(mocks.environment(), tx, &Config::default());
        Self {
            machine: StateMachine::new(),
            ctx,
            rx,
            mocks,
        }
    }

    pub fn status(&self) -> CooperateStatus {
        self.machine.status()
    }

    /// Handle `event`, then everything it caused to be queued.
    pub fn dispatch(&mut self, event: CooperateEvent) {
        self.machine.on_event(&mut self.ctx, event);
        self.pump();
    }

    /// Handle queued events until the channel is empty.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.rx.try_recv() {
            self.machine.on_event(&mut self.ctx, event);
            handled += 1;
        }
        handled
    }

    /// Submit a start the way the public API does: claim the busy flag,
    /// then enqueue.
    pub fn start(&mut self, peer: &str, start_device: i32) -> SinkReceiver {
        let busy = self.ctx.events.busy().try_begin_start();
        let (event, sink) = start_event(peer, start_device);
        if busy {
            self.dispatch(CooperateEvent::Start(event));
        }
        sink
    }

    /// Enter In with `peer` as the device whose input we receive.
    pub fn paired_in(&mut self, peer: &str) {
        self.dispatch(CooperateEvent::RemoteStart(remote_start(peer, peer)));
        assert_eq!(self.status(), CooperateStatus::In);
        self.mocks.transport.clear_history();
        self.mocks.notifier.clear();
    }

    /// Fire every armed timer and handle what they queued.
    pub fn fire_timers(&mut self) -> usize {
        let fired = self.mocks.timer.fire_all();
        self.pump();
        fired
    }
}

pub fn start_event(peer: &str, start_device: i32) -> (StartCooperateEvent, SinkReceiver) {
    let (error_sink, rx) = ErrorSink::new();
    let event = StartCooperateEvent {
        pid: CLIENT,
        user_data: 1,
        remote_network_id: NetworkId::from(peer),
        start_device_id: DeviceId(start_device),
        uid: 1,
        error_sink,
    };
    (event, rx)
}

pub fn stop(is_unchained: bool) -> CooperateEvent {
    CooperateEvent::Stop(StopCooperateEvent {
        pid: CLIENT,
        user_data: 2,
        is_unchained,
    })
}

pub fn remote_start(sender: &str, origin: &str) -> RemoteStartEvent {
    RemoteStartEvent {
        network_id: NetworkId::from(sender),
        origin_network_id: NetworkId::from(origin),
        cursor_pos: Coordinate::new(50, 50),
        pointer_speed: 10,
        touchpad_speed: 10,
        uid: 1,
        options: None,
    }
}

/// Wait until `rx` reports `status`.
pub async fn wait_status(rx: &mut watch::Receiver<CooperateStatus>, status: CooperateStatus) {
    let waited = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == status)).await;
    assert!(
        matches!(waited, Ok(Ok(_))),
        "timed out waiting for {status}"
    );
}

/// Poll `cond` until it holds.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..250 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
