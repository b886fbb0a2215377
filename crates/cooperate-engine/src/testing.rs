//! Helpers shared by unit tests.

use cooperate_adapters::mock::MockEnvironment;
use cooperate_types::{
    Coordinate, CoordinationErrCode, CooperateEvent, DeviceId, ErrorSink, NetworkId, Pid,
    RemoteStartEvent, StartCooperateEvent, StopCooperateEvent,
};
use tokio::sync::oneshot;

use crate::channel::{channel, Receiver};
use crate::config::Config;
use crate::context::Context;

pub const CLIENT: Pid = Pid(100);

pub fn context(local: &str) -> (Context, MockEnvironment, Receiver) {
    let mocks = MockEnvironment::new(local);
    let (tx, rx) = channel(64, 0);
    let ctx = Context::new(mocks.environment(), tx, &Config::default());
    (ctx, mocks, rx)
}

pub type SinkReceiver = oneshot::Receiver<Result<(), CoordinationErrCode>>;

pub fn start(peer: &str, start_device: i32) -> (StartCooperateEvent, SinkReceiver) {
    let (error_sink, rx) = ErrorSink::new();
    let event = StartCooperateEvent {
        pid: CLIENT,
        user_data: 1,
        remote_network_id: NetworkId::from(peer),
        start_device_id: DeviceId(start_device),
        uid: 7,
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
        pointer_speed: 5,
        touchpad_speed: 6,
        uid: 9,
        options: None,
    }
}

/// Drain every queued event.
pub fn drain(rx: &mut Receiver) -> Vec<CooperateEvent> {
    std::iter::from_fn(|| rx.try_recv()).collect()
}
