// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! An in-memory switch.

use crate::flow::{Flow, FlowEntry, FlowId};
use crate::message::{FlowStats, FlowStatsRequest, MultipartReply, PacketOut};
use crate::switch::{OfSwitch, SwitchError};
use crate::table::TableId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    packets: u64,
    bytes: u64,
}

/// A switch that keeps its flow tables in memory.
///
/// Besides implementing [`OfSwitch`], it lets the caller look at the
/// installed flows, fake flow counters and inject install failures.
#[derive(Debug)]
pub struct SoftSwitch {
    flows: DashMap<FlowId, FlowEntry>,
    counters: DashMap<FlowId, Counters>,
    next_cookie: AtomicU64,
    connected: AtomicBool,
    failing_installs: AtomicUsize,
    installs: AtomicU64,
    deletes: AtomicU64,
    packet_outs: Mutex<Vec<PacketOut>>,
    stats_requests: Mutex<Vec<FlowStatsRequest>>,
}

impl Default for SoftSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftSwitch {
    /// Create a connected switch with empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flows: DashMap::new(),
            counters: DashMap::new(),
            next_cookie: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            failing_installs: AtomicUsize::new(0),
            installs: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            packet_outs: Mutex::new(Vec::new()),
            stats_requests: Mutex::new(Vec::new()),
        }
    }

    /// Mark the switch connected or disconnected.
    /// A disconnected switch refuses every operation.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `count` flow installs fail.
    pub fn fail_next_installs(&self, count: usize) {
        self.failing_installs.store(count, Ordering::SeqCst);
    }

    /// Number of installed flows.
    #[must_use]
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Number of successful installs since creation.
    #[must_use]
    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::SeqCst)
    }

    /// Number of successful deletes since creation.
    #[must_use]
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Look up an installed flow.
    #[must_use]
    pub fn flow(&self, id: FlowId) -> Option<FlowEntry> {
        self.flows.get(&id).map(|entry| entry.value().clone())
    }

    /// All installed flows of `table`, ordered by cookie.
    #[must_use]
    pub fn flows_in(&self, table: TableId) -> Vec<Flow> {
        let mut flows: Vec<Flow> = self
            .flows
            .iter()
            .filter(|entry| entry.value().table == table)
            .map(|entry| Flow {
                id: *entry.key(),
                entry: entry.value().clone(),
            })
            .collect();
        flows.sort_by_key(|flow| flow.id);
        flows
    }

    /// Render every installed flow, one line each, ordered by table,
    /// then descending priority, then text.
    #[must_use]
    pub fn dump_flows(&self) -> Vec<String> {
        let mut rows: Vec<(TableId, u16, String)> = self
            .flows
            .iter()
            .map(|entry| {
                let flow = entry.value();
                (flow.table, flow.priority, flow.to_string())
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
        rows.into_iter()
            .map(|(table, _, text)| format!("table={table}, {text}"))
            .collect()
    }

    /// Set the counters reported for a flow.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::NoSuchFlow`] if the flow is not installed.
    pub fn set_flow_counters(&self, id: FlowId, packets: u64, bytes: u64) -> Result<(), SwitchError> {
        if !self.flows.contains_key(&id) {
            return Err(SwitchError::NoSuchFlow(id));
        }
        self.counters.insert(id, Counters { packets, bytes });
        Ok(())
    }

    /// Build the reply the switch would send to a flow stats request for `table`.
    #[must_use]
    pub fn flow_stats_reply(&self, table: TableId) -> MultipartReply {
        let stats = self
            .flows_in(table)
            .into_iter()
            .map(|flow| {
                let counters = self
                    .counters
                    .get(&flow.id)
                    .map(|c| *c.value())
                    .unwrap_or_default();
                FlowStats {
                    cookie: flow.id,
                    table: flow.entry.table,
                    priority: flow.entry.priority,
                    matcher: flow.entry.matcher,
                    packet_count: counters.packets,
                    byte_count: counters.bytes,
                }
            })
            .collect();
        MultipartReply::Flow(stats)
    }

    /// Packets injected so far.
    #[must_use]
    pub fn packet_outs(&self) -> Vec<PacketOut> {
        self.packet_outs.lock().clone()
    }

    /// Stats requests received so far.
    #[must_use]
    pub fn stats_requests(&self) -> Vec<FlowStatsRequest> {
        self.stats_requests.lock().clone()
    }

    /// Drain the stats requests received so far.
    #[must_use]
    pub fn take_stats_requests(&self) -> Vec<FlowStatsRequest> {
        std::mem::take(&mut *self.stats_requests.lock())
    }

    fn check_connected(&self) -> Result<(), SwitchError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SwitchError::Disconnected)
        }
    }
}

impl OfSwitch for SoftSwitch {
    fn install_flow(&self, entry: FlowEntry) -> Result<FlowId, SwitchError> {
        self.check_connected()?;
        let failing = self
            .failing_installs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            debug!("refusing flow in table {}: {entry}", entry.table);
            return Err(SwitchError::Rejected {
                table: entry.table,
                reason: "install failure injected".to_string(),
            });
        }
        let id = FlowId(self.next_cookie.fetch_add(1, Ordering::SeqCst));
        trace!("install {id} table={}, {entry}", entry.table);
        self.flows.insert(id, entry);
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn delete_flow(&self, id: FlowId) -> Result<(), SwitchError> {
        self.check_connected()?;
        let Some((_, entry)) = self.flows.remove(&id) else {
            return Err(SwitchError::NoSuchFlow(id));
        };
        trace!("delete {id} table={}, {entry}", entry.table);
        self.counters.remove(&id);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn send_packet_out(&self, packet: PacketOut) -> Result<(), SwitchError> {
        self.check_connected()?;
        self.packet_outs.lock().push(packet);
        Ok(())
    }

    fn send_stats_request(&self, request: FlowStatsRequest) -> Result<(), SwitchError> {
        self.check_connected()?;
        self.stats_requests.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
mod tests {
    use super::*;
    use crate::flow::{FlowMatch, Next};
    use crate::table::{FLOW_MATCH_PRIORITY, FLOW_MISS_PRIORITY};
    use net::Protocol;
    use pretty_assertions::assert_eq;

    fn miss(table: TableId, next: TableId) -> FlowEntry {
        FlowEntry {
            table,
            priority: FLOW_MISS_PRIORITY,
            matcher: FlowMatch::default(),
            set_fields: vec![],
            next: Next::GotoTable(next),
        }
    }

    #[test]
    fn install_and_delete() {
        let switch = SoftSwitch::new();
        let a = switch
            .install_flow(miss(TableId::SRV_PROXY_DNAT, TableId::DST_GRP))
            .unwrap();
        let b = switch
            .install_flow(miss(TableId::SRV_PROXY_SNAT, TableId::IP))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(switch.flow_count(), 2);
        assert_eq!(
            switch.dump_flows(),
            vec![
                "table=3, priority=1 actions=goto_table:4".to_string(),
                "table=6, priority=1 actions=goto_table:7".to_string(),
            ]
        );
        switch.delete_flow(a).unwrap();
        assert_eq!(switch.delete_flow(a), Err(SwitchError::NoSuchFlow(a)));
        assert_eq!(switch.flow_count(), 1);
        assert_eq!(switch.install_count(), 2);
        assert_eq!(switch.delete_count(), 1);
    }

    #[test]
    fn injected_failures() {
        let switch = SoftSwitch::new();
        switch.fail_next_installs(1);
        let entry = miss(TableId::SRV_PROXY_DNAT, TableId::DST_GRP);
        assert!(matches!(
            switch.install_flow(entry.clone()),
            Err(SwitchError::Rejected { .. })
        ));
        assert!(switch.install_flow(entry).is_ok());
    }

    #[test]
    fn disconnected() {
        let switch = SoftSwitch::new();
        switch.set_connected(false);
        let entry = miss(TableId::SRV_PROXY_DNAT, TableId::DST_GRP);
        assert_eq!(switch.install_flow(entry), Err(SwitchError::Disconnected));
        assert_eq!(
            switch.send_stats_request(FlowStatsRequest {
                table: TableId::SRV_PROXY_DNAT
            }),
            Err(SwitchError::Disconnected)
        );
    }

    #[test]
    fn counters_in_reply() {
        let switch = SoftSwitch::new();
        let nat = FlowEntry {
            table: TableId::SRV_PROXY_DNAT,
            priority: FLOW_MATCH_PRIORITY,
            matcher: FlowMatch {
                l4_dst: Some(80),
                ..FlowMatch::ipv4(Protocol::Tcp)
            },
            set_fields: vec![],
            next: Next::GotoTable(TableId::DST_GRP),
        };
        let id = switch.install_flow(nat).unwrap();
        switch
            .install_flow(miss(TableId::SRV_PROXY_SNAT, TableId::IP))
            .unwrap();
        switch.set_flow_counters(id, 3, 300).unwrap();

        let MultipartReply::Flow(stats) = switch.flow_stats_reply(TableId::SRV_PROXY_DNAT) else {
            unreachable!("soft switch replies with flow stats");
        };
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].cookie, id);
        assert_eq!(stats[0].packet_count, 3);
        assert_eq!(stats[0].byte_count, 300);

        switch.delete_flow(id).unwrap();
        assert_eq!(
            switch.set_flow_counters(id, 1, 1),
            Err(SwitchError::NoSuchFlow(id))
        );
    }
}
