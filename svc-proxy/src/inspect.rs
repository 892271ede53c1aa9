// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Snapshot of the proxy state for debugging.

use crate::catalogue::{PortSpec, ServiceSpec};
use crate::natflow::ServiceTables;
use crate::oper::OperState;
use crate::proxy::ServiceProxy;
use crate::stats::EndpointStats;
use openflow::FlowId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDump {
    pub ip: IpAddr,
    pub load: u64,
    pub clients: BTreeSet<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDump {
    pub name: String,
    pub ip: IpAddr,
    pub ports: Vec<PortSpec>,
    pub providers: Vec<ProviderDump>,
    /// Keys of the installed NAT flows
    pub nat_flows: Vec<String>,
    pub watch_flows: Vec<FlowId>,
}

impl From<&OperState> for ServiceDump {
    fn from(oper: &OperState) -> Self {
        Self {
            name: oper.name.clone(),
            ip: oper.ip,
            ports: oper.ports.clone(),
            providers: oper
                .providers
                .iter()
                .map(|(ip, handle)| ProviderDump {
                    ip: *ip,
                    load: oper.scheduler.load(*ip).unwrap_or_default(),
                    clients: handle.clients.clone(),
                })
                .collect(),
            nat_flows: oper.nat_flows.keys().map(ToString::to_string).collect(),
            watch_flows: oper.watch_flows.iter().map(|f| f.id).collect(),
        }
    }
}

/// Catalogue, active services and endpoint statistics of a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyStateDump {
    pub tables: Option<ServiceTables>,
    pub specs: BTreeMap<String, ServiceSpec>,
    pub providers: BTreeMap<String, BTreeSet<IpAddr>>,
    pub services: Vec<ServiceDump>,
    pub endpoint_stats: BTreeMap<IpAddr, EndpointStats>,
}

impl ProxyStateDump {
    /// The dump of the active service with address `ip`.
    #[must_use]
    pub fn service(&self, ip: IpAddr) -> Option<&ServiceDump> {
        self.services.iter().find(|s| s.ip == ip)
    }
}

impl ServiceProxy {
    /// Snapshot the proxy state.
    #[must_use]
    pub fn inspect_state(&self) -> ProxyStateDump {
        let state = self.state.lock();
        ProxyStateDump {
            tables: state.tables,
            specs: state
                .catalogue
                .specs()
                .map(|(name, spec)| (name.to_string(), spec.clone()))
                .collect(),
            providers: state
                .catalogue
                .provider_sets()
                .map(|(name, set)| (name.to_string(), set.clone()))
                .collect(),
            services: state.oper.values().map(ServiceDump::from).collect(),
            endpoint_stats: state
                .stats
                .endpoints()
                .iter()
                .map(|(ip, stats)| (*ip, stats.clone()))
                .collect(),
        }
    }
}
