// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Live state of an active service.

use crate::catalogue::{PortSpec, ServiceSpec};
use crate::errors::ProxyError;
use crate::natflow::FlowKey;
use crate::scheduler::Scheduler;
use openflow::{FLOW_FLOOD_PRIORITY, Flow, FlowEntry, FlowMatch, Next, OfSwitch, TableId};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Clients currently served by a provider.
#[derive(Debug, Default, Clone)]
pub(crate) struct ProviderHandle {
    pub clients: BTreeSet<IpAddr>,
}

/// Runtime state of a service that has both a spec and providers.
#[derive(Debug)]
pub(crate) struct OperState {
    pub name: String,
    pub ip: IpAddr,
    pub ports: Vec<PortSpec>,
    pub scheduler: Scheduler,
    pub providers: BTreeMap<IpAddr, ProviderHandle>,
    pub nat_flows: BTreeMap<FlowKey, Flow>,
    pub watch_flows: Vec<Flow>,
}

impl OperState {
    pub(crate) fn new(name: &str, spec: &ServiceSpec) -> Self {
        Self {
            name: name.to_string(),
            ip: spec.ip,
            ports: spec.ports.clone(),
            scheduler: Scheduler::new(),
            providers: BTreeMap::new(),
            nat_flows: BTreeMap::new(),
            watch_flows: Vec::new(),
        }
    }

    /// Start serving from `provider`, with no load.
    pub(crate) fn add_provider(&mut self, provider: IpAddr) {
        if self.scheduler.add_provider(provider) {
            debug!("service {}: added provider {provider}", self.ip);
            self.providers.entry(provider).or_default();
        }
    }

    /// The provider `client` is bound to, if any.
    pub(crate) fn provider_of(&self, client: IpAddr) -> Option<IpAddr> {
        self.providers
            .iter()
            .find(|(_, handle)| handle.clients.contains(&client))
            .map(|(provider, _)| *provider)
    }

    /// Provider for a new packet of `client`: its current one if it is
    /// already bound, else the least used one.
    pub(crate) fn allocate_provider(&mut self, client: IpAddr) -> Result<IpAddr, ProxyError> {
        if let Some(provider) = self.provider_of(client) {
            return Ok(provider);
        }
        let provider = self
            .scheduler
            .select()
            .ok_or(ProxyError::NoProviderAvailable(self.ip))?;
        self.providers
            .entry(provider)
            .or_default()
            .clients
            .insert(client);
        Ok(provider)
    }

    /// Install one flow per distinct protocol that punts otherwise unmatched
    /// traffic to the service to the controller. On failure the flows
    /// installed so far are removed.
    pub(crate) fn install_watch_flows(
        &mut self,
        switch: &dyn OfSwitch,
        dnat_table: TableId,
    ) -> Result<(), ProxyError> {
        let protocols: BTreeSet<_> = self.ports.iter().map(|p| p.protocol).collect();
        for protocol in protocols {
            let entry = FlowEntry {
                table: dnat_table,
                priority: FLOW_FLOOD_PRIORITY,
                matcher: FlowMatch {
                    ip_dst: Some(self.ip),
                    ..FlowMatch::ipv4(protocol)
                },
                set_fields: vec![],
                next: Next::Controller,
            };
            match switch.install_flow(entry.clone()) {
                Ok(id) => {
                    info!("service {}: watching {protocol} traffic to {} ({id})", self.name, self.ip);
                    self.watch_flows.push(Flow { id, entry });
                }
                Err(source) => {
                    self.remove_watch_flows(switch);
                    return Err(ProxyError::FlowInstall {
                        service: self.name.clone(),
                        flow: format!("watch.{protocol}.{}", self.ip),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn remove_watch_flows(&mut self, switch: &dyn OfSwitch) {
        for flow in self.watch_flows.drain(..) {
            if let Err(e) = switch.delete_flow(flow.id) {
                warn!("service {}: failed to delete watch flow {}: {e}", self.name, flow.id);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
mod tests {
    use super::*;
    use net::Protocol;
    use openflow::SoftSwitch;
    use std::net::Ipv4Addr;

    fn spec() -> ServiceSpec {
        ServiceSpec::new(
            IpAddr::V4(Ipv4Addr::new(10, 254, 0, 10)),
            vec![
                PortSpec::new(Protocol::Tcp, 5600, 9600),
                PortSpec::new(Protocol::Tcp, 5601, 9601),
                PortSpec::new(Protocol::Udp, 5600, 9600),
            ],
        )
    }

    #[test]
    fn watch_flows_per_protocol() {
        let switch = SoftSwitch::new();
        let mut oper = OperState::new("web", &spec());
        oper.install_watch_flows(&switch, TableId::SRV_PROXY_DNAT).unwrap();
        assert_eq!(oper.watch_flows.len(), 2);
        assert_eq!(
            switch.dump_flows(),
            vec![
                "table=3, priority=10,tcp,nw_dst=10.254.0.10 actions=CONTROLLER".to_string(),
                "table=3, priority=10,udp,nw_dst=10.254.0.10 actions=CONTROLLER".to_string(),
            ]
        );
        oper.remove_watch_flows(&switch);
        assert_eq!(switch.flow_count(), 0);
    }

    #[test]
    fn watch_flow_failure_rolls_back() {
        let switch = SoftSwitch::new();
        let failing = FailSecond::new(&switch);
        let mut oper = OperState::new("web", &spec());
        // tcp watch flow goes in, udp one is refused
        assert!(matches!(
            oper.install_watch_flows(&failing, TableId::SRV_PROXY_DNAT),
            Err(ProxyError::FlowInstall { .. })
        ));
        assert!(oper.watch_flows.is_empty());
        assert_eq!(switch.flow_count(), 0);
        assert_eq!(switch.install_count(), 1);
        assert_eq!(switch.delete_count(), 1);
    }

    /// Wraps a switch so that the second install fails.
    struct FailSecond<'a> {
        inner: &'a SoftSwitch,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl<'a> FailSecond<'a> {
        fn new(inner: &'a SoftSwitch) -> Self {
            Self {
                inner,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl OfSwitch for FailSecond<'_> {
        fn install_flow(&self, entry: FlowEntry) -> Result<openflow::FlowId, openflow::SwitchError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 1 {
                self.inner.fail_next_installs(1);
            }
            self.inner.install_flow(entry)
        }
        fn delete_flow(&self, id: openflow::FlowId) -> Result<(), openflow::SwitchError> {
            self.inner.delete_flow(id)
        }
        fn send_packet_out(&self, packet: openflow::PacketOut) -> Result<(), openflow::SwitchError> {
            self.inner.send_packet_out(packet)
        }
        fn send_stats_request(
            &self,
            request: openflow::FlowStatsRequest,
        ) -> Result<(), openflow::SwitchError> {
            self.inner.send_stats_request(request)
        }
    }

    #[test]
    fn allocation_is_sticky() {
        let mut oper = OperState::new("web", &spec());
        let client = IpAddr::V4(Ipv4Addr::new(10, 2, 2, 2));
        assert!(matches!(
            oper.allocate_provider(client),
            Err(ProxyError::NoProviderAvailable(_))
        ));
        oper.add_provider(IpAddr::V4(Ipv4Addr::new(20, 1, 1, 22)));
        oper.add_provider(IpAddr::V4(Ipv4Addr::new(20, 1, 1, 23)));
        let first = oper.allocate_provider(client).unwrap();
        assert_eq!(oper.allocate_provider(client).unwrap(), first);
        assert_eq!(oper.scheduler.load(first), Some(1));
        assert_eq!(oper.provider_of(client), Some(first));
    }
}
