// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT flow lifecycle.
//!
//! Every client/provider pairing of a service is realized by two flows per
//! service port:
//!
//! * a [`Direction::Dst`] flow in the DNAT table, matching
//!   `client -> service:svc_port` and rewriting it to
//!   `client -> provider:prov_port`;
//! * a [`Direction::Src`] flow in the SNAT table, matching
//!   `provider:prov_port -> client` and rewriting it to
//!   `service:svc_port -> client`.
//!
//! Both flows are keyed by the client address so that a client's flows can
//! be found without knowing which provider serves it.

use crate::catalogue::PortSpec;
use crate::errors::ProxyError;
use crate::oper::OperState;
use crate::stats::{FlowRecord, StatsStore};
use net::{Mac, Protocol};
use openflow::{
    FLOW_MATCH_PRIORITY, Flow, FlowEntry, FlowId, FlowMatch, Next, OfSwitch, SetField, TableId,
};
use serde::Serialize;
use std::fmt::Display;
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Which side of a pairing a NAT flow translates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Direction {
    /// Provider to client traffic, source rewritten to the service
    Src,
    /// Client to service traffic, destination rewritten to the provider
    Dst,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Src => f.write_str("Src"),
            Direction::Dst => f.write_str("Dst"),
        }
    }
}

/// Identity of a NAT flow within a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    /// Client address
    pub endpoint: IpAddr,
    pub direction: Direction,
    pub protocol: Protocol,
    pub service_port: u16,
}

impl FlowKey {
    #[must_use]
    pub fn new(endpoint: IpAddr, direction: Direction, port: PortSpec) -> Self {
        Self {
            endpoint,
            direction,
            protocol: port.protocol,
            service_port: port.service_port,
        }
    }
}

impl Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.endpoint, self.direction, self.protocol, self.service_port
        )
    }
}

/// The flow tables used by the proxy and the tables they continue to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceTables {
    pub dnat: TableId,
    pub snat: TableId,
    pub dnat_next: TableId,
    pub snat_next: TableId,
}

/// Parties of a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub client: IpAddr,
    pub service: IpAddr,
    pub provider: IpAddr,
}

/// Build the flow realizing one direction of a pairing on one port.
#[must_use]
pub fn nat_entry(
    tables: ServiceTables,
    port: PortSpec,
    pairing: Pairing,
    direction: Direction,
    rewrite_mac: Option<Mac>,
) -> FlowEntry {
    match direction {
        Direction::Dst => {
            let mut set_fields = vec![
                SetField::L4Dst(port.protocol, port.provider_port),
                SetField::IpDst(pairing.provider),
            ];
            if let Some(mac) = rewrite_mac {
                set_fields.push(SetField::EthDst(mac));
            }
            FlowEntry {
                table: tables.dnat,
                priority: FLOW_MATCH_PRIORITY,
                matcher: FlowMatch {
                    ip_src: Some(pairing.client),
                    ip_dst: Some(pairing.service),
                    l4_dst: Some(port.service_port),
                    ..FlowMatch::ipv4(port.protocol)
                },
                set_fields,
                next: Next::GotoTable(tables.dnat_next),
            }
        }
        Direction::Src => FlowEntry {
            table: tables.snat,
            priority: FLOW_MATCH_PRIORITY,
            matcher: FlowMatch {
                ip_src: Some(pairing.provider),
                ip_dst: Some(pairing.client),
                l4_src: Some(port.provider_port),
                ..FlowMatch::ipv4(port.protocol)
            },
            set_fields: vec![
                SetField::L4Src(port.protocol, port.service_port),
                SetField::IpSrc(pairing.service),
            ],
            next: Next::GotoTable(tables.snat_next),
        },
    }
}

/// What NAT flow management needs besides the service's own state.
pub(crate) struct NatContext<'a> {
    pub switch: &'a dyn OfSwitch,
    pub tables: Option<ServiceTables>,
    pub stats: &'a mut StatsStore,
}

impl OperState {
    /// Install one direction of a pairing on one port. Installing a flow
    /// whose key already exists is a no-op returning the existing cookie.
    pub(crate) fn install_nat(
        &mut self,
        ctx: &mut NatContext<'_>,
        port: PortSpec,
        pairing: Pairing,
        direction: Direction,
        rewrite_mac: Option<Mac>,
    ) -> Result<FlowId, ProxyError> {
        let key = FlowKey::new(pairing.client, direction, port);
        if let Some(flow) = self.nat_flows.get(&key) {
            debug!("flow {key} already installed as {}", flow.id);
            return Ok(flow.id);
        }
        let tables = ctx.tables.ok_or(ProxyError::TablesNotConfigured)?;
        let entry = nat_entry(tables, port, pairing, direction, rewrite_mac);
        let id = ctx
            .switch
            .install_flow(entry.clone())
            .map_err(|source| ProxyError::FlowInstall {
                service: self.name.clone(),
                flow: key.to_string(),
                source,
            })?;
        info!("added NAT {key} to {} ({id})", pairing.provider);
        metrics::counter!("svc_proxy_nat_flows_installed_total").increment(1);
        ctx.stats.record(id, FlowRecord::new(pairing, direction, port));
        self.nat_flows.insert(key, Flow { id, entry });
        Ok(id)
    }

    /// Remove one direction of a client's pairing on one port. Removing a
    /// missing flow is not an error. The flow is forgotten even if the switch
    /// refuses to delete it.
    pub(crate) fn remove_nat(
        &mut self,
        ctx: &mut NatContext<'_>,
        port: PortSpec,
        endpoint: IpAddr,
        direction: Direction,
    ) {
        let key = FlowKey::new(endpoint, direction, port);
        let Some(flow) = self.nat_flows.remove(&key) else {
            debug!("no NAT flow {key} to delete");
            return;
        };
        ctx.stats.forget(flow.id);
        match ctx.switch.delete_flow(flow.id) {
            Ok(()) => {
                info!("deleted NAT {key} ({})", flow.id);
                metrics::counter!("svc_proxy_nat_flows_removed_total").increment(1);
            }
            Err(source) => {
                let err = ProxyError::FlowRemove {
                    service: self.name.clone(),
                    flow: key.to_string(),
                    source,
                };
                warn!("{err}");
            }
        }
    }

    /// Remove both flows of `client` on every port.
    fn remove_client_flows(&mut self, ctx: &mut NatContext<'_>, client: IpAddr) {
        for port in self.ports.clone() {
            self.remove_nat(ctx, port, client, Direction::Dst);
            self.remove_nat(ctx, port, client, Direction::Src);
        }
    }

    /// Remove every pairing of `client` and give back its provider's load.
    pub(crate) fn tear_down_client(&mut self, ctx: &mut NatContext<'_>, client: IpAddr) {
        let Some(provider) = self.provider_of(client) else {
            return;
        };
        debug!("service {}: removing client {client} of {provider}", self.ip);
        self.remove_client_flows(ctx, client);
        if let Some(handle) = self.providers.get_mut(&provider) {
            handle.clients.remove(&client);
        }
        self.scheduler.release(provider);
    }

    /// Remove every pairing of `provider` and forget the provider.
    pub(crate) fn tear_down_provider(&mut self, ctx: &mut NatContext<'_>, provider: IpAddr) {
        let Some(handle) = self.providers.remove(&provider) else {
            return;
        };
        debug!(
            "service {}: removing provider {provider} and its {} clients",
            self.ip,
            handle.clients.len()
        );
        for client in handle.clients {
            self.remove_client_flows(ctx, client);
        }
        self.scheduler.remove_provider(provider);
    }

    /// Remove every NAT and watch flow of the service.
    pub(crate) fn tear_down_service(&mut self, ctx: &mut NatContext<'_>) {
        let providers: Vec<IpAddr> = self.providers.keys().copied().collect();
        for provider in providers {
            self.tear_down_provider(ctx, provider);
        }
        // keys whose pairing was lost track of, e.g. after a failed install
        let leftovers: Vec<FlowKey> = self.nat_flows.keys().copied().collect();
        for key in leftovers {
            if let Some(flow) = self.nat_flows.remove(&key) {
                ctx.stats.forget(flow.id);
                if let Err(e) = ctx.switch.delete_flow(flow.id) {
                    warn!("failed to delete NAT {key}: {e}");
                }
            }
        }
        self.remove_watch_flows(ctx.switch);
    }
}
