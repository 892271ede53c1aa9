// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime loop of the agent.
//!
//! The in-memory switch has no connection to carry replies, so the loop
//! plays that part: stats requests the poller sent are answered and the
//! replies handed to the proxy.

use openflow::SoftSwitch;
use std::time::Duration;
use svc_proxy::ServiceProxy;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// Serve until a stop request arrives on `stop`.
pub(crate) async fn serve(
    proxy: &ServiceProxy,
    switch: &SoftSwitch,
    mut stop: UnboundedReceiver<()>,
    tick: Duration,
) {
    proxy.start_stats_poll(&Handle::current());
    let mut ticker = tokio::time::interval(tick);
    loop {
        tokio::select! {
            _ = stop.recv() => {
                info!("stop requested");
                break;
            }
            _ = ticker.tick() => answer_stats_requests(proxy, switch),
        }
    }
    proxy.stop_stats_poll();
}

fn answer_stats_requests(proxy: &ServiceProxy, switch: &SoftSwitch) {
    for request in switch.take_stats_requests() {
        debug!("answering flow stats request for table {}", request.table);
        proxy.handle_flow_stats_reply(&switch.flow_stats_reply(request.table));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
mod tests {
    use super::*;
    use net::Mac;
    use net::test_utils::tcp_frame;
    use openflow::{DatapathMode, PacketIn, TableId};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use svc_proxy::{EndpointTable, PortSpec, ProxyParamsBuilder, ServiceSpec};
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn stats_flow_back_to_the_proxy() {
        let switch = Arc::new(SoftSwitch::new());
        let params = ProxyParamsBuilder::default()
            .stats_warmup(Duration::from_secs(1))
            .build()
            .unwrap();
        let proxy = Arc::new(ServiceProxy::new(
            switch.clone(),
            Arc::new(EndpointTable::new()),
            params,
        ));
        let next = DatapathMode::Vlan.service_next_tables();
        proxy.configure_service_tables(next.dnat_next, next.snat_next).unwrap();
        let service = Ipv4Addr::new(10, 254, 0, 10);
        proxy
            .add_service_spec(
                "svc1",
                ServiceSpec::new(
                    IpAddr::V4(service),
                    vec![PortSpec::new(net::Protocol::Tcp, 5600, 9600)],
                ),
            )
            .unwrap();
        proxy
            .update_providers("svc1", [IpAddr::V4(Ipv4Addr::new(20, 1, 1, 22))])
            .unwrap();
        proxy.handle_packet_in(&PacketIn {
            table: TableId::SRV_PROXY_DNAT,
            in_port: 1,
            data: tcp_frame(
                Mac([0x02, 0, 0, 0, 0, 1]),
                Mac::BROADCAST,
                Ipv4Addr::new(10, 2, 2, 2),
                service,
                40000,
                5600,
            ),
        });
        for flow in switch.flows_in(TableId::SRV_PROXY_DNAT) {
            switch.set_flow_counters(flow.id, 3, 180).unwrap();
        }

        let (stop_tx, stop_rx) = tokio::sync::mpsc::unbounded_channel();
        let task = {
            let proxy = proxy.clone();
            let switch = switch.clone();
            tokio::spawn(async move {
                serve(&proxy, &switch, stop_rx, Duration::from_millis(100)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(1500)).await;
        stop_tx.send(()).unwrap();
        task.await.unwrap();

        assert!(!proxy.is_polling_stats());
        let stats = proxy.endpoint_stats();
        let client = &stats[&IpAddr::V4(Ipv4Addr::new(10, 2, 2, 2))];
        let provider = &client.services[&IpAddr::V4(service)].providers
            [&IpAddr::V4(Ipv4Addr::new(20, 1, 1, 22))];
        assert_eq!(provider.packets_out, 3);
        assert_eq!(provider.bytes_out, 180);
        assert!(logs_contain("stop requested"));
    }
}
