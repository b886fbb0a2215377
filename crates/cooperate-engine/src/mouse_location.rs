//! Cursor-location sharing between devices.
//!
//! A client may listen to the cursor of the local device or of a remote
//! one. For a remote device the first listener subscribes over the
//! transport and the last one to leave unsubscribes; the remote side
//! then streams its location with every local pointer event.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cooperate_adapters::ClientNotifier;
use cooperate_types::{
    MouseLocation, MouseLocationReplyEvent, NetworkId, Notification, PeerMessage, Pid,
    RemoteMouseLocationEvent,
};
use tracing::{debug, info, warn};

use crate::transport_handler::TransportHandler;

pub struct MouseLocationHub {
    local_id: NetworkId,
    transport: TransportHandler,
    notifier: Arc<dyn ClientNotifier>,
    /// Clients listening to the local cursor.
    local_listeners: BTreeSet<Pid>,
    /// Clients listening to a remote cursor, by device.
    remote_listeners: BTreeMap<NetworkId, BTreeSet<Pid>>,
    /// Devices streaming our cursor.
    subscribers: BTreeSet<NetworkId>,
}

impl MouseLocationHub {
    #[must_use]
    pub fn new(
        local_id: NetworkId,
        transport: TransportHandler,
        notifier: Arc<dyn ClientNotifier>,
    ) -> Self {
        Self {
            local_id,
            transport,
            notifier,
            local_listeners: BTreeSet::new(),
            remote_listeners: BTreeMap::new(),
            subscribers: BTreeSet::new(),
        }
    }

    fn is_local(&self, network_id: &NetworkId) -> bool {
        network_id.is_empty() || *network_id == self.local_id
    }

    /// Start reporting the cursor of `network_id` to `pid`.
    pub fn add_listener(&mut self, pid: Pid, network_id: &NetworkId) {
        if self.is_local(network_id) {
            self.local_listeners.insert(pid);
            debug!(%pid, "local mouse location listener added");
            return;
        }
        let pids = self.remote_listeners.entry(network_id.clone()).or_default();
        let first = pids.is_empty();
        if !pids.insert(pid) || !first {
            return;
        }
        info!(peer = %network_id.anonymize(), "subscribing to mouse location");
        let subscribed = self.transport.open_session(network_id).is_ok()
            && self
                .transport
                .send(network_id, PeerMessage::SubscribeMouseLocation)
                .is_ok();
        if !subscribed {
            warn!(peer = %network_id.anonymize(), "mouse location subscription failed");
            self.remote_listeners.remove(network_id);
        }
    }

    pub fn remove_listener(&mut self, pid: Pid, network_id: &NetworkId) {
        if self.is_local(network_id) {
            self.local_listeners.remove(&pid);
            return;
        }
        let emptied = match self.remote_listeners.get_mut(network_id) {
            Some(pids) => pids.remove(&pid) && pids.is_empty(),
            None => false,
        };
        if emptied {
            self.remote_listeners.remove(network_id);
            self.unsubscribe(network_id);
        }
    }

    /// Forget every listener of a client that went away.
    pub fn remove_client(&mut self, pid: Pid) {
        self.local_listeners.remove(&pid);
        let mut emptied = Vec::new();
        for (network_id, pids) in &mut self.remote_listeners {
            if pids.remove(&pid) && pids.is_empty() {
                emptied.push(network_id.clone());
            }
        }
        for network_id in emptied {
            self.remote_listeners.remove(&network_id);
            self.unsubscribe(&network_id);
        }
    }

    fn unsubscribe(&self, network_id: &NetworkId) {
        info!(peer = %network_id.anonymize(), "unsubscribing from mouse location");
        if self
            .transport
            .send(network_id, PeerMessage::UnsubscribeMouseLocation)
            .is_err()
        {
            debug!(peer = %network_id.anonymize(), "unsubscribe not delivered");
        }
    }

    /// `from` wants our cursor location.
    pub fn on_subscribe(&mut self, from: &NetworkId) {
        info!(peer = %from.anonymize(), "mouse location subscriber added");
        self.subscribers.insert(from.clone());
        let reply = PeerMessage::ReplySubscribeMouseLocation { result: true };
        if self.transport.send(from, reply).is_err() {
            self.subscribers.remove(from);
        }
    }

    pub fn on_unsubscribe(&mut self, from: &NetworkId) {
        let result = self.subscribers.remove(from);
        info!(peer = %from.anonymize(), result, "mouse location subscriber removed");
        let reply = PeerMessage::ReplyUnsubscribeMouseLocation { result };
        if self.transport.send(from, reply).is_err() {
            debug!(peer = %from.anonymize(), "unsubscribe reply not delivered");
        }
    }

    /// A refused subscription leaves nothing to listen to.
    pub fn on_reply_subscribe(&mut self, event: &MouseLocationReplyEvent) {
        if event.result {
            debug!(peer = %event.network_id.anonymize(), "mouse location subscribed");
            return;
        }
        warn!(peer = %event.network_id.anonymize(), "mouse location subscription refused");
        self.remote_listeners.remove(&event.network_id);
    }

    pub fn on_reply_unsubscribe(&self, event: &MouseLocationReplyEvent) {
        debug!(
            peer = %event.network_id.anonymize(),
            result = event.result,
            "mouse location unsubscribed"
        );
    }

    /// Deliver a remote cursor location to the clients listening to it.
    pub fn on_remote_location(&self, event: &RemoteMouseLocationEvent) {
        let Some(pids) = self.remote_listeners.get(&event.network_id) else {
            debug!(peer = %event.network_id.anonymize(), "unsolicited mouse location");
            return;
        };
        for pid in pids {
            self.notifier.notify(
                *pid,
                Notification::MouseLocation {
                    network_id: event.network_id.clone(),
                    location: event.location,
                },
            );
        }
    }

    /// Report the local cursor to local listeners and remote subscribers.
    pub fn on_local_pointer(&mut self, location: MouseLocation) {
        for pid in &self.local_listeners {
            self.notifier.notify(
                *pid,
                Notification::MouseLocation {
                    network_id: self.local_id.clone(),
                    location,
                },
            );
        }
        let failed: Vec<NetworkId> = self
            .subscribers
            .iter()
            .filter(|peer| {
                self.transport
                    .send(peer, PeerMessage::MouseLocation { location })
                    .is_err()
            })
            .cloned()
            .collect();
        for peer in failed {
            self.subscribers.remove(&peer);
        }
    }

    /// Drop everything exchanged with a device whose session closed.
    pub fn on_session_closed(&mut self, network_id: &NetworkId) {
        let was_subscriber = self.subscribers.remove(network_id);
        let had_listeners = self.remote_listeners.remove(network_id).is_some();
        if was_subscriber || had_listeners {
            info!(peer = %network_id.anonymize(), "mouse location sharing ended");
        }
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &NetworkId> {
        self.subscribers.iter()
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &NetworkId> {
        self.remote_listeners.keys()
    }

    #[must_use]
    pub fn has_local_listeners(&self) -> bool {
        !self.local_listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use cooperate_adapters::mock::{MockTransport, RecordingNotifier};
    use cooperate_types::{Coordinate, DisplayGeometry};

    use super::*;
    use crate::channel::{channel, Receiver};

    fn hub() -> (MouseLocationHub, MockTransport, RecordingNotifier, Receiver) {
        let transport = MockTransport::new("A");
        let notifier = RecordingNotifier::default();
        let (tx, rx) = channel(16, 0);
        let handler = TransportHandler::new(Arc::new(transport.clone()), tx);
        let hub = MouseLocationHub::new(NetworkId::from("A"), handler, Arc::new(notifier.clone()));
        (hub, transport, notifier, rx)
    }

    fn location(x: i32, y: i32) -> MouseLocation {
        MouseLocation {
            position: Coordinate::new(x, y),
            display: DisplayGeometry::new(1920, 1080),
        }
    }

    #[test]
    fn first_remote_listener_subscribes_and_last_unsubscribes() {
        let (mut hub, transport, _, _) = hub();
        let b = NetworkId::from("B");
        hub.add_listener(Pid(1), &b);
        hub.add_listener(Pid(2), &b);
        assert_eq!(transport.opened(), vec![b.clone()]);
        assert_eq!(transport.sent_to("B"), vec![PeerMessage::SubscribeMouseLocation]);

        hub.remove_listener(Pid(1), &b);
        assert_eq!(transport.sent_to("B").len(), 1);
        hub.remove_listener(Pid(2), &b);
        assert_eq!(
            transport.sent_to("B").last(),
            Some(&PeerMessage::UnsubscribeMouseLocation)
        );
        assert_eq!(hub.subscriptions().count(), 0);
    }

    #[test]
    fn failed_subscription_is_forgotten() {
        let (mut hub, transport, _, mut rx) = hub();
        transport.fail_send("B");
        hub.add_listener(Pid(1), &NetworkId::from("B"));
        assert_eq!(hub.subscriptions().count(), 0);
        // The send failure is also reported as a closed session.
        assert!(rx.try_recv().is_some());
    }

    #[test]
    fn subscriber_receives_local_pointer_and_listeners_are_notified() {
        let (mut hub, transport, notifier, _) = hub();
        hub.add_listener(Pid(3), &NetworkId::default());
        hub.on_subscribe(&NetworkId::from("C"));
        assert_eq!(
            transport.sent_to("C"),
            vec![PeerMessage::ReplySubscribeMouseLocation { result: true }]
        );

        hub.on_local_pointer(location(10, 20));
        assert_eq!(
            transport.sent_to("C").last(),
            Some(&PeerMessage::MouseLocation {
                location: location(10, 20)
            })
        );
        assert_eq!(
            notifier.for_pid(Pid(3)),
            vec![Notification::MouseLocation {
                network_id: NetworkId::from("A"),
                location: location(10, 20),
            }]
        );

        hub.on_unsubscribe(&NetworkId::from("C"));
        hub.on_local_pointer(location(11, 20));
        let to_c = transport.sent_to("C");
        assert_eq!(
            to_c.last(),
            Some(&PeerMessage::ReplyUnsubscribeMouseLocation { result: true })
        );
        assert_eq!(to_c.len(), 3);
    }

    #[test]
    fn remote_location_reaches_only_its_listeners() {
        let (mut hub, _, notifier, _) = hub();
        hub.add_listener(Pid(1), &NetworkId::from("B"));
        hub.add_listener(Pid(2), &NetworkId::from("C"));

        hub.on_remote_location(&RemoteMouseLocationEvent {
            network_id: NetworkId::from("B"),
            location: location(5, 5),
        });
        hub.on_remote_location(&RemoteMouseLocationEvent {
            network_id: NetworkId::from("D"),
            location: location(6, 6),
        });

        assert_eq!(notifier.for_pid(Pid(1)).len(), 1);
        assert!(notifier.for_pid(Pid(2)).is_empty());
    }

    #[test]
    fn refused_subscription_drops_listeners() {
        let (mut hub, _, notifier, _) = hub();
        let b = NetworkId::from("B");
        hub.add_listener(Pid(1), &b);
        hub.on_reply_subscribe(&MouseLocationReplyEvent {
            network_id: b.clone(),
            result: false,
        });
        hub.on_remote_location(&RemoteMouseLocationEvent {
            network_id: b,
            location: location(1, 1),
        });
        assert!(notifier.all().is_empty());
    }

    #[test]
    fn closed_client_and_session_are_cleaned_up() {
        let (mut hub, transport, _, _) = hub();
        hub.add_listener(Pid(1), &NetworkId::from("B"));
        hub.on_subscribe(&NetworkId::from("C"));

        hub.remove_client(Pid(1));
        assert_eq!(
            transport.sent_to("B").last(),
            Some(&PeerMessage::UnsubscribeMouseLocation)
        );

        hub.on_session_closed(&NetworkId::from("C"));
        assert_eq!(hub.subscribers().count(), 0);
    }
}
