//! Bridge between the transport adapter and the event channel.
//!
//! Outbound: session management and sends go through here so that a send
//! failure turns into a `SessionClosed` event for the peer, sharing the
//! normal disconnect recovery path. Inbound: peer messages and session
//! callbacks become [`CooperateEvent`]s tagged with the sender.

use std::sync::Arc;

use cooperate_adapters::{AdapterError, InboundCallback, Transport};
use cooperate_types::{
    ComeBackEvent, CooperateEvent, MouseLocationReplyEvent, MouseLocationSubscriptionEvent,
    NetworkId, PeerMessage, RelayCooperateEvent, RelayCooperateFinishedEvent,
    RemoteHotPlugEvent, RemoteInputDeviceSyncEvent, RemoteMouseLocationEvent,
    RemoteStartEvent, RemoteStartResponseEvent, RemoteStopEvent, SessionClosedEvent,
    SessionOpenedEvent,
};
use tracing::{debug, info, warn};

use crate::channel::Sender;

#[derive(Clone)]
pub struct TransportHandler {
    transport: Arc<dyn Transport>,
    sender: Sender,
}

impl TransportHandler {
    pub fn new(transport: Arc<dyn Transport>, sender: Sender) -> Self {
        Self { transport, sender }
    }

    pub fn local_network_id(&self) -> NetworkId {
        self.transport.local_network_id()
    }

    pub fn open_session(&self, peer: &NetworkId) -> Result<(), AdapterError> {
        self.transport.open_session(peer).map_err(|e| {
            warn!(peer = %peer.anonymize(), error = %e, "failed to open session");
            e
        })
    }

    pub fn close_session(&self, peer: &NetworkId) {
        debug!(peer = %peer.anonymize(), "closing session");
        self.transport.close_session(peer);
    }

    pub fn close_all_sessions(&self) {
        info!("closing all sessions");
        self.transport.close_all_sessions();
    }

    /// Send `msg` to `peer`. A failed send is also reported to the engine
    /// as `SessionClosed`.
    pub fn send(&self, peer: &NetworkId, msg: PeerMessage) -> Result<(), AdapterError> {
        let kind = msg.name();
        match self.transport.send(peer, msg) {
            Ok(()) => {
                debug!(peer = %peer.anonymize(), kind, "sent");
                Ok(())
            }
            Err(e) => {
                self.on_communication_failure(peer, &e);
                Err(e)
            }
        }
    }

    /// Inbound message from `from`.
    pub fn on_message(&self, from: NetworkId, msg: PeerMessage) {
        debug!(peer = %from.anonymize(), kind = msg.name(), "received");
        self.enqueue(Self::translate(from, msg));
    }

    pub fn on_session_opened(&self, peer: NetworkId) {
        info!(peer = %peer.anonymize(), "session opened");
        self.enqueue(CooperateEvent::SessionOpened(SessionOpenedEvent { network_id: peer }));
    }

    pub fn on_session_closed(&self, peer: NetworkId) {
        info!(peer = %peer.anonymize(), "session closed");
        self.enqueue(CooperateEvent::SessionClosed(SessionClosedEvent { network_id: peer }));
    }

    /// Callback to hand to a transport that delivers inbound messages.
    pub fn inbound_callback(&self) -> InboundCallback {
        let handler = self.clone();
        Box::new(move |from, msg| handler.on_message(from, msg))
    }

    /// Map a peer message to the event it produces on the receiving side.
    pub fn translate(from: NetworkId, msg: PeerMessage) -> CooperateEvent {
        match msg {
            PeerMessage::StartCooperate {
                origin,
                cursor_pos,
                pointer_speed,
                touchpad_speed,
                uid,
                options,
            } => CooperateEvent::RemoteStart(RemoteStartEvent {
                network_id: from,
                origin_network_id: origin,
                cursor_pos,
                pointer_speed,
                touchpad_speed,
                uid,
                options,
            }),
            PeerMessage::StartCooperateResponse { normal } => {
                CooperateEvent::RemoteStartResponse(RemoteStartResponseEvent {
                    network_id: from,
                    normal,
                })
            }
            PeerMessage::StopCooperate => {
                CooperateEvent::RemoteStop(RemoteStopEvent { network_id: from })
            }
            PeerMessage::ComeBack {
                origin,
                cursor_pos,
                options,
            } => CooperateEvent::ComeBack(ComeBackEvent {
                network_id: from,
                origin_network_id: origin,
                cursor_pos,
                options,
            }),
            PeerMessage::RelayCooperate {
                target,
                pointer_speed,
                touchpad_speed,
                uid,
            } => CooperateEvent::RelayCooperate(RelayCooperateEvent {
                network_id: from,
                target_network_id: target,
                pointer_speed,
                touchpad_speed,
                uid,
            }),
            PeerMessage::RelayCooperateFinished {
                target,
                normal,
                uid,
            } => CooperateEvent::RelayCooperateFinished(RelayCooperateFinishedEvent {
                network_id: from,
                target_network_id: target,
                normal,
                uid,
            }),
            PeerMessage::InputDeviceSync { devices } => {
                CooperateEvent::RemoteInputDeviceSync(RemoteInputDeviceSyncEvent {
                    network_id: from,
                    devices,
                })
            }
            PeerMessage::HotPlug { kind, device } => {
                CooperateEvent::RemoteHotPlug(RemoteHotPlugEvent {
                    network_id: from,
                    kind,
                    device,
                })
            }
            PeerMessage::SubscribeMouseLocation => CooperateEvent::SubscribeMouseLocation(
                MouseLocationSubscriptionEvent { network_id: from },
            ),
            PeerMessage::UnsubscribeMouseLocation => CooperateEvent::UnsubscribeMouseLocation(
                MouseLocationSubscriptionEvent { network_id: from },
            ),
            PeerMessage::ReplySubscribeMouseLocation { result } => {
                CooperateEvent::ReplySubscribeMouseLocation(MouseLocationReplyEvent {
                    network_id: from,
                    result,
                })
            }
            PeerMessage::ReplyUnsubscribeMouseLocation { result } => {
                CooperateEvent::ReplyUnsubscribeMouseLocation(MouseLocationReplyEvent {
                    network_id: from,
                    result,
                })
            }
            PeerMessage::MouseLocation { location } => {
                CooperateEvent::RemoteMouseLocation(RemoteMouseLocationEvent {
                    network_id: from,
                    location,
                })
            }
        }
    }

    fn on_communication_failure(&self, peer: &NetworkId, error: &AdapterError) {
        warn!(peer = %peer.anonymize(), %error, "communication failure");
        self.enqueue(CooperateEvent::SessionClosed(SessionClosedEvent {
            network_id: peer.clone(),
        }));
    }

    fn enqueue(&self, event: CooperateEvent) {
        let kind = event.kind();
        if let Err(e) = self.sender.send(event) {
            warn!(%kind, error = %e, "failed to enqueue transport event");
        }
    }
}

impl std::fmt::Debug for TransportHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandler")
            .field("local", &self.transport.local_network_id())
            .finish_non_exhaustive()
    }
}
