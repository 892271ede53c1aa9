// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! First packet of a client to a service.

use crate::natflow::{Direction, Pairing};
use crate::proxy::{ProxyState, ServiceProxy};
use net::Mac;
use net::frame::{FrameSummary, set_source_mac};
use openflow::{PacketIn, PacketOut, PseudoPort};
use std::net::IpAddr;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

impl ServiceProxy {
    /// Handle a packet punted by a watch flow.
    ///
    /// Selects a provider for the client, installs the NAT flows of the
    /// pairing for every port of the service and re-injects the packet into
    /// the pipeline, where it now hits those flows. Re-injected packets carry
    /// the loop sentinel as source mac and are dropped should they come back.
    #[tracing::instrument(level = "debug", skip(self, packet), fields(table = %packet.table, in_port = packet.in_port))]
    pub fn handle_packet_in(&self, packet: &PacketIn) {
        if packet.table != self.params.dnat_table {
            return;
        }
        let frame = match FrameSummary::parse(&packet.data) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("ignoring packet: {e}");
                return;
            }
        };
        if frame.src_mac == self.params.loop_sentinel {
            warn!(
                "packet {} -> {} came back with our source mac, loop?",
                frame.src_ip, frame.dst_ip
            );
            metrics::counter!("svc_proxy_packet_in_dropped_total", "reason" => "loop").increment(1);
            return;
        }

        let service = IpAddr::V4(frame.dst_ip);
        let client = IpAddr::V4(frame.src_ip);
        debug!("packet from {client} to service {service}");

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(oper) = state.oper.get_mut(&service) else {
            // service deleted while the packet was in flight
            debug!("no active service {service}");
            return;
        };
        let provider = match oper.allocate_provider(client) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("dropping packet: {e}");
                metrics::counter!("svc_proxy_packet_in_dropped_total", "reason" => "no_provider")
                    .increment(1);
                return;
            }
        };
        let rewrite_mac = self.rewrite_mac(packet.in_port, provider);
        info!("service {service}: client {client} served by {provider}");

        let pairing = Pairing {
            client,
            service,
            provider,
        };
        let mut ctx = ProxyState::nat_context(&*self.switch, state.tables, &mut state.stats);
        for port in oper.ports.clone() {
            if let Err(e) = oper.install_nat(&mut ctx, port, pairing, Direction::Dst, rewrite_mac) {
                warn!("{e}");
                continue;
            }
            if let Err(e) = oper.install_nat(&mut ctx, port, pairing, Direction::Src, None) {
                warn!("{e}");
            }
        }
        metrics::counter!("svc_proxy_packet_in_handled_total").increment(1);

        if frame.src_mac.is_zero() {
            debug!("not re-injecting synthetic packet");
        } else {
            let mut data = packet.data.clone();
            let reinject = set_source_mac(&mut data, self.params.loop_sentinel).map(|()| PacketOut {
                in_port: packet.in_port,
                data,
                output: PseudoPort::Table,
            });
            match reinject {
                Ok(out) => {
                    if let Err(e) = self.switch.send_packet_out(out) {
                        warn!("failed to re-inject packet to {service}: {e}");
                    }
                }
                Err(e) => warn!("failed to re-inject packet to {service}: {e}"),
            }
        }

        if state.poller.is_none()
            && let Ok(runtime) = Handle::try_current()
        {
            self.start_poller_locked(state, &runtime);
        }
    }

    /// Mac of the provider when it sits on the client's vlan, in which case
    /// the client's traffic must be addressed to it directly.
    fn rewrite_mac(&self, in_port: u32, provider: IpAddr) -> Option<Mac> {
        let Some(client) = self.directory.local_endpoint_by_port(in_port) else {
            debug!("no local endpoint on port {in_port}");
            return None;
        };
        let Some(target) = self.directory.endpoint_by_ip_vlan(provider, client.vlan) else {
            debug!("provider {provider} not found on vlan {}", client.vlan);
            return None;
        };
        (target.vlan == client.vlan).then_some(target.mac)
    }
}
