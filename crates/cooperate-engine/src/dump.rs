//! Diagnostics dump.

use std::io::Write;

use cooperate_adapters::MonitorId;
use cooperate_types::{
    Coordinate, CooperateStatus, DeviceId, HotArea, NetworkId, Pid, COOPERATE_FLAG_FREEZE_CURSOR,
    COOPERATE_FLAG_HIDE_CURSOR,
};

use crate::context::Context;
use crate::event_manager::{CallKind, PendingRequest};
use crate::state_machine::StateMachine;

/// Point-in-time copy of the engine state, refreshed by the worker after
/// every event.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub status: CooperateStatus,
    pub local: NetworkId,
    pub peer: Option<NetworkId>,
    pub cursor: Option<Coordinate>,
    pub flag: u32,
    pub start_device: DeviceId,
    pub online: Vec<NetworkId>,
    pub listeners: Vec<Pid>,
    pub hot_area_listeners: Vec<Pid>,
    pub hot_area: HotArea,
    pub mouse_subscribers: Vec<NetworkId>,
    pub mouse_subscriptions: Vec<NetworkId>,
    pub pending: Vec<(CallKind, PendingRequest)>,
    pub relay: String,
    pub pointer_monitor: Option<MonitorId>,
    pub transitions: u64,
}

impl Snapshot {
    #[must_use]
    pub fn capture(machine: &StateMachine, ctx: &Context) -> Self {
        let mut pending: Vec<(CallKind, PendingRequest)> = ctx
            .events
            .pending_requests()
            .map(|(kind, request)| (*kind, request.clone()))
            .collect();
        pending.sort_by_key(|(kind, _)| *kind);
        Self {
            status: machine.status(),
            local: ctx.local_id().clone(),
            peer: ctx.peer().cloned(),
            cursor: ctx.last_pointer(),
            flag: ctx.flag(),
            start_device: ctx.start_device_id(),
            online: machine.online_peers().cloned().collect(),
            listeners: ctx.events.listeners().snapshot(),
            hot_area_listeners: ctx.hot_area.listeners().copied().collect(),
            hot_area: ctx.hot_area.current(),
            mouse_subscribers: ctx.mouse_location.subscribers().cloned().collect(),
            mouse_subscriptions: ctx.mouse_location.subscriptions().cloned().collect(),
            pending,
            relay: machine
                .relay_phase()
                .map_or_else(|| "n/a".to_string(), ToString::to_string),
            pointer_monitor: ctx.pointer_monitor(),
            transitions: machine.transitions(),
        }
    }

    pub fn render<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "cooperate state: {}", self.status)?;
        writeln!(w, "  local:        {}", self.local.anonymize())?;
        match &self.peer {
            Some(peer) => writeln!(w, "  peer:         {}", peer.anonymize())?,
            None => writeln!(w, "  peer:         none")?,
        }
        match self.cursor {
            Some(pos) => writeln!(w, "  cursor:       {pos}")?,
            None => writeln!(w, "  cursor:       unknown")?,
        }
        writeln!(w, "  flag:         {:#x}{}", self.flag, flag_names(self.flag))?;
        writeln!(w, "  start device: {}", self.start_device)?;

        let online: Vec<String> = self.online.iter().map(NetworkId::anonymize).collect();
        writeln!(w, "  online:       [{}]", online.join(", "))?;
        let listeners: Vec<String> = self.listeners.iter().map(ToString::to_string).collect();
        writeln!(w, "  listeners:    [{}]", listeners.join(", "))?;
        let hot: Vec<String> = self
            .hot_area_listeners
            .iter()
            .map(ToString::to_string)
            .collect();
        writeln!(w, "  hot area:     {} [{}]", self.hot_area, hot.join(", "))?;
        let subscribers: Vec<String> =
            self.mouse_subscribers.iter().map(NetworkId::anonymize).collect();
        writeln!(w, "  mouse to:     [{}]", subscribers.join(", "))?;
        let subscriptions: Vec<String> =
            self.mouse_subscriptions.iter().map(NetworkId::anonymize).collect();
        writeln!(w, "  mouse from:   [{}]", subscriptions.join(", "))?;

        if self.pending.is_empty() {
            writeln!(w, "  pending:      none")?;
        }
        for (kind, request) in &self.pending {
            writeln!(
                w,
                "  pending:      {kind:?} pid={} user_data={} peer={}",
                request.pid,
                request.user_data,
                request.network_id.anonymize()
            )?;
        }
        writeln!(w, "  relay:        {}", self.relay)?;
        match self.pointer_monitor {
            Some(id) => writeln!(w, "  monitor:      {id}")?,
            None => writeln!(w, "  monitor:      none")?,
        }
        writeln!(w, "  transitions:  {}", self.transitions)
    }
}

fn flag_names(flag: u32) -> String {
    let mut names = Vec::new();
    if flag & COOPERATE_FLAG_HIDE_CURSOR != 0 {
        names.push("hide cursor");
    }
    if flag & COOPERATE_FLAG_FREEZE_CURSOR != 0 {
        names.push("freeze cursor");
    }
    if names.is_empty() {
        String::new()
    } else {
        format!(" ({})", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use cooperate_types::CooperateEvent;

    use super::*;
    use crate::testing::{context, start};

    fn render(snapshot: &Snapshot) -> String {
        let mut out = Vec::new();
        snapshot.render(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn idle_engine_dump() {
        let (ctx, _mocks, _) = context("A");
        let machine = StateMachine::new();
        let text = render(&Snapshot::capture(&machine, &ctx));
        assert!(text.starts_with("cooperate state: free\n"));
        assert!(text.contains("peer:         none"));
        assert!(text.contains("flag:         0x1 (hide cursor)"));
        assert!(text.contains("pending:      none"));
        assert!(text.contains("relay:        n/a"));
        assert!(text.contains("hot area:     none []"));
        assert!(text.contains("mouse to:     []"));
    }

    #[test]
    fn dump_lists_location_sharing() {
        let (mut ctx, _mocks, _) = context("A");
        let machine = StateMachine::new();
        ctx.hot_area.add_listener(Pid(5));
        ctx.mouse_location.on_subscribe(&NetworkId::from("C"));

        let snapshot = Snapshot::capture(&machine, &ctx);
        assert_eq!(snapshot.hot_area_listeners, vec![Pid(5)]);
        assert_eq!(snapshot.mouse_subscribers, vec![NetworkId::from("C")]);
        let text = render(&snapshot);
        assert!(text.contains("hot area:     none [5]"));
    }

    #[test]
    fn dump_while_out() {
        let (mut ctx, _mocks, _) = context("A");
        let mut machine = StateMachine::new();
        let (event, _) = start("B", 3);
        machine.on_event(&mut ctx, CooperateEvent::Start(event));

        let snapshot = Snapshot::capture(&machine, &ctx);
        assert_eq!(snapshot.status, CooperateStatus::Out);
        assert_eq!(snapshot.peer, Some(NetworkId::from("B")));
        assert_eq!(snapshot.start_device, DeviceId(3));
        let text = render(&snapshot);
        assert!(text.contains("start device: 3"));
        assert!(text.contains("transitions:  1"));
    }
}
