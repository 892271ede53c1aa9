// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Agent configuration file.

use crate::error::AgentError;
use openflow::{DatapathMode, TableId};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use svc_proxy::{
    ConfigError, Endpoint, EndpointTable, PortSpec, ProxyParams, ProxyParamsBuilder,
    ServiceProxy, ServiceSpec,
};
use tracing::{info, warn};

/// Overrides of the proxy parameters. Unset fields keep their default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProxyConfig {
    pub dnat_table: Option<TableId>,
    pub snat_table: Option<TableId>,
    pub stats_warmup_secs: Option<u64>,
    pub stats_interval_ms: Option<u64>,
}

impl ProxyConfig {
    pub(crate) fn params(&self) -> Result<ProxyParams, AgentError> {
        let mut builder = ProxyParamsBuilder::default();
        if let Some(table) = self.dnat_table {
            builder.dnat_table(table);
        }
        if let Some(table) = self.snat_table {
            builder.snat_table(table);
        }
        if let Some(secs) = self.stats_warmup_secs {
            builder.stats_warmup(Duration::from_secs(secs));
        }
        if let Some(ms) = self.stats_interval_ms {
            if ms == 0 {
                return Err(AgentError::Params("stats interval must be non-zero".to_string()));
            }
            builder.stats_interval(Duration::from_millis(ms));
        }
        builder
            .build()
            .map_err(|e| AgentError::Params(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PortConfig {
    pub protocol: String,
    pub service_port: u16,
    pub provider_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServiceConfig {
    pub name: String,
    pub ip: IpAddr,
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub providers: Vec<IpAddr>,
}

impl ServiceConfig {
    pub(crate) fn spec(&self) -> Result<ServiceSpec, ConfigError> {
        let ports = self
            .ports
            .iter()
            .map(|p| PortSpec::from_parts(&p.protocol, p.service_port, p.provider_port))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ServiceSpec::new(self.ip, ports))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AgentConfig {
    #[serde(default)]
    pub mode: DatapathMode,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl AgentConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, AgentError> {
        let text = std::fs::read_to_string(path).map_err(|source| AgentError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub(crate) fn parse(text: &str) -> Result<Self, AgentError> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Program the proxy: tables for `mode`, then endpoints, specs and
    /// providers. A service with a bad spec is reported and skipped, the
    /// rest of the configuration still applies.
    pub(crate) fn apply(
        &self,
        mode: DatapathMode,
        proxy: &ServiceProxy,
        directory: &EndpointTable,
    ) -> Result<(), AgentError> {
        let next = mode.service_next_tables();
        proxy.configure_service_tables(next.dnat_next, next.snat_next)?;
        info!(
            "datapath mode {mode}, service tables continue to {} and {}",
            next.dnat_next, next.snat_next
        );

        for endpoint in &self.endpoints {
            directory.add(*endpoint);
        }
        for service in &self.services {
            if let Err(e) = Self::apply_service(service, proxy) {
                warn!("skipping service {}: {e}", service.name);
            }
        }
        Ok(())
    }

    fn apply_service(service: &ServiceConfig, proxy: &ServiceProxy) -> Result<(), AgentError> {
        let spec = service.spec().map_err(|source| AgentError::Service {
            service: service.name.clone(),
            source,
        })?;
        proxy.add_service_spec(&service.name, spec)?;
        proxy.update_providers(&service.name, service.providers.iter().copied())?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
mod tests {
    use super::*;
    use net::Mac;
    use openflow::SoftSwitch;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const SAMPLE: &str = include_str!("../config/sample.yaml");

    #[test]
    fn parse_sample() {
        let config = AgentConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.mode, DatapathMode::Vxlan);
        assert_eq!(config.proxy.stats_warmup_secs, Some(20));
        assert_eq!(config.services.len(), 2);
        let svc1 = &config.services[0];
        assert_eq!(svc1.name, "svc1");
        assert_eq!(
            svc1.spec().unwrap().ports,
            vec![PortSpec::new(net::Protocol::Tcp, 5600, 9600)]
        );
        assert_eq!(svc1.providers.len(), 2);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].port, Some(3));
        assert_eq!(config.endpoints[1].port, None);
        assert_eq!(
            config.endpoints[0].mac,
            Mac([0x02, 0x00, 0x0a, 0x02, 0x02, 0x02])
        );
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::parse("{}").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.proxy.params().unwrap(), ProxyParams::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(matches!(
            AgentConfig::parse("services: []\nbogus: 1\n"),
            Err(AgentError::Yaml(_))
        ));
    }

    #[test]
    fn proxy_overrides() {
        let config =
            AgentConfig::parse("proxy:\n  stats_interval_ms: 250\n  dnat_table: 30\n").unwrap();
        let params = config.proxy.params().unwrap();
        assert_eq!(params.stats_interval, Duration::from_millis(250));
        assert_eq!(params.dnat_table, TableId(30));
        assert_eq!(params.snat_table, TableId::SRV_PROXY_SNAT);

        let config = AgentConfig::parse("proxy:\n  stats_interval_ms: 0\n").unwrap();
        assert!(matches!(config.proxy.params(), Err(AgentError::Params(_))));
    }

    #[test]
    fn apply_skips_bad_services() {
        let yaml = r"
mode: vlan
services:
  - name: bad
    ip: 10.254.0.99
    ports:
      - { protocol: sctp, service_port: 1, provider_port: 1 }
    providers: [20.1.1.30]
  - name: web
    ip: 10.254.0.10
    ports:
      - { protocol: tcp, service_port: 80, provider_port: 8080 }
      - { protocol: UDP, service_port: 53, provider_port: 53 }
    providers: [20.1.1.22]
";
        let config = AgentConfig::parse(yaml).unwrap();
        let switch = Arc::new(SoftSwitch::new());
        let directory = Arc::new(EndpointTable::new());
        let proxy = ServiceProxy::new(switch.clone(), directory.clone(), ProxyParams::default());
        config.apply(config.mode, &proxy, &directory).unwrap();

        let state = proxy.inspect_state();
        assert_eq!(state.specs.keys().collect::<Vec<_>>(), vec!["web"]);
        assert_eq!(state.services.len(), 1);
        // two miss flows, tcp and udp watch flows
        assert_eq!(switch.flow_count(), 4);
        assert!(
            switch
                .dump_flows()
                .contains(&"table=6, priority=1 actions=goto_table:9".to_string())
        );
    }
}
