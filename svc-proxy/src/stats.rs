// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow statistics of the service proxy.
//!
//! Every NAT flow is recorded at install time under its cookie. Flow stats
//! replies from the switch are matched against those records and folded into
//! per-endpoint statistics: client to provider traffic (DNAT flows) is
//! accounted as `out`, provider to client traffic (SNAT flows) as `in`.
//!
//! The switch reports absolute counters per flow. A service with several
//! ports has several flows per pairing, so the records remember the last
//! counters seen and only the increase is added to the endpoint statistics.

use crate::catalogue::PortSpec;
use crate::natflow::{Direction, Pairing};
use net::Protocol;
use openflow::{FlowId, FlowStats, FlowStatsRequest, OfSwitch, TableId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Counters between a client and one provider of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub provider_ip: IpAddr,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Counters between a client and one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub service_ip: IpAddr,
    pub protocol: Protocol,
    pub service_port: u16,
    pub provider_port: u16,
    pub providers: BTreeMap<IpAddr, ProviderStats>,
}

/// Service counters of one client endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub endpoint_ip: IpAddr,
    pub services: BTreeMap<IpAddr, ServiceStats>,
}

/// What a NAT flow stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlowRecord {
    pub pairing: Pairing,
    pub direction: Direction,
    pub port: PortSpec,
    last_packets: u64,
    last_bytes: u64,
}

impl FlowRecord {
    pub(crate) fn new(pairing: Pairing, direction: Direction, port: PortSpec) -> Self {
        Self {
            pairing,
            direction,
            port,
            last_packets: 0,
            last_bytes: 0,
        }
    }
}

/// Increase of a counter, a decrease meaning the counter was reset.
fn increase(now: u64, last: u64) -> u64 {
    now.checked_sub(last).unwrap_or(now)
}

/// Flow records and the endpoint statistics built from them.
#[derive(Debug, Default)]
pub(crate) struct StatsStore {
    records: HashMap<FlowId, FlowRecord>,
    endpoints: HashMap<IpAddr, EndpointStats>,
}

impl StatsStore {
    pub(crate) fn record(&mut self, id: FlowId, record: FlowRecord) {
        self.records.insert(id, record);
    }

    pub(crate) fn forget(&mut self, id: FlowId) -> Option<FlowRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn forget_endpoint(&mut self, endpoint: IpAddr) {
        self.endpoints.remove(&endpoint);
    }

    pub(crate) fn endpoints(&self) -> &HashMap<IpAddr, EndpointStats> {
        &self.endpoints
    }

    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Fold the counters of one flow into the endpoint statistics.
    /// Returns false if the flow is not a known NAT flow.
    pub(crate) fn apply(&mut self, stats: &FlowStats) -> bool {
        // watch flows never pin a port
        if !stats.matcher.has_l4_port() {
            return false;
        }
        let Some(record) = self.records.get_mut(&stats.cookie) else {
            trace!("no record for flow {}", stats.cookie);
            return false;
        };
        let packets = increase(stats.packet_count, record.last_packets);
        let bytes = increase(stats.byte_count, record.last_bytes);
        record.last_packets = stats.packet_count;
        record.last_bytes = stats.byte_count;

        let pairing = record.pairing;
        let port = record.port;
        let endpoint = self
            .endpoints
            .entry(pairing.client)
            .or_insert_with(|| EndpointStats {
                endpoint_ip: pairing.client,
                services: BTreeMap::new(),
            });
        let service = endpoint
            .services
            .entry(pairing.service)
            .or_insert_with(|| ServiceStats {
                service_ip: pairing.service,
                protocol: port.protocol,
                service_port: port.service_port,
                provider_port: port.provider_port,
                providers: BTreeMap::new(),
            });
        service.protocol = port.protocol;
        let provider = service
            .providers
            .entry(pairing.provider)
            .or_insert_with(|| ProviderStats {
                provider_ip: pairing.provider,
                packets_in: 0,
                packets_out: 0,
                bytes_in: 0,
                bytes_out: 0,
            });
        match record.direction {
            Direction::Dst => {
                service.service_port = port.service_port;
                provider.packets_out += packets;
                provider.bytes_out += bytes;
            }
            Direction::Src => {
                service.provider_port = port.provider_port;
                provider.packets_in += packets;
                provider.bytes_in += bytes;
            }
        }
        true
    }
}

/// Periodic flow stats requests.
///
/// After a warm-up delay the poller alternately asks for the counters of the
/// DNAT and SNAT tables, one request per interval. It runs until stopped or
/// dropped.
#[derive(Debug)]
pub struct StatsPoller {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StatsPoller {
    /// Spawn the poller on `runtime`.
    pub fn spawn(
        runtime: &Handle,
        switch: Arc<dyn OfSwitch>,
        tables: [TableId; 2],
        warmup: Duration,
        interval: Duration,
    ) -> Self {
        let (stop, stopped) = oneshot::channel();
        let task = runtime.spawn(poll_flow_stats(switch, tables, warmup, interval, stopped));
        Self {
            stop: Some(stop),
            task,
        }
    }

    /// Ask the poller to stop.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StatsPoller {
    fn drop(&mut self) {
        self.stop();
        self.task.abort();
    }
}

async fn poll_flow_stats(
    switch: Arc<dyn OfSwitch>,
    tables: [TableId; 2],
    warmup: Duration,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) {
    debug!("stats poller started, first request in {warmup:?}");
    tokio::select! {
        _ = &mut stopped => {
            debug!("stats poller stopped during warm-up");
            return;
        }
        () = tokio::time::sleep(warmup) => {}
    }
    for table in tables.iter().cycle() {
        match switch.send_stats_request(FlowStatsRequest { table: *table }) {
            Ok(()) => {
                trace!("requested flow stats of table {table}");
                metrics::counter!("svc_proxy_stats_requests_total").increment(1);
            }
            Err(e) => warn!("failed to request flow stats of table {table}: {e}"),
        }
        tokio::select! {
            _ = &mut stopped => {
                info!("stats poller stopped");
                return;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }
}
