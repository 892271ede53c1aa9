// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Desired service configuration.

use crate::errors::ConfigError;
use net::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// One port exposed by a service and the port providers serve it on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortSpec {
    pub protocol: Protocol,
    pub service_port: u16,
    pub provider_port: u16,
}

impl PortSpec {
    #[must_use]
    pub fn new(protocol: Protocol, service_port: u16, provider_port: u16) -> Self {
        Self {
            protocol,
            service_port,
            provider_port,
        }
    }

    /// Build a [`PortSpec`] from a protocol name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedProtocol`] if `protocol` is neither TCP nor UDP.
    pub fn from_parts(
        protocol: &str,
        service_port: u16,
        provider_port: u16,
    ) -> Result<Self, ConfigError> {
        let protocol = protocol
            .parse::<Protocol>()
            .map_err(|e| ConfigError::UnsupportedProtocol(e.0))?;
        Ok(Self::new(protocol, service_port, provider_port))
    }
}

/// A virtual service: an address and the ports it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub ip: IpAddr,
    pub ports: Vec<PortSpec>,
}

impl ServiceSpec {
    #[must_use]
    pub fn new(ip: IpAddr, ports: Vec<PortSpec>) -> Self {
        Self { ip, ports }
    }

    /// Check that the proxy can realize this spec.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the address is not IPv4, a port is zero, or
    /// two ports share protocol and service port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ip.is_ipv4() {
            return Err(ConfigError::UnsupportedAddress(self.ip));
        }
        let mut seen = BTreeSet::new();
        for port in &self.ports {
            if port.service_port == 0 || port.provider_port == 0 {
                return Err(ConfigError::InvalidPort {
                    protocol: port.protocol,
                    service_port: port.service_port,
                    provider_port: port.provider_port,
                });
            }
            if !seen.insert((port.protocol, port.service_port)) {
                return Err(ConfigError::DuplicatePort {
                    protocol: port.protocol,
                    service_port: port.service_port,
                });
            }
        }
        Ok(())
    }

    /// Distinct protocols of the spec, in a stable order.
    #[must_use]
    pub fn protocols(&self) -> BTreeSet<Protocol> {
        self.ports.iter().map(|p| p.protocol).collect()
    }
}

/// Service specs and provider sets by service name.
///
/// Specs and providers are declared independently and either may arrive
/// first.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Catalogue {
    specs: BTreeMap<String, ServiceSpec>,
    providers: BTreeMap<String, BTreeSet<IpAddr>>,
}

impl Catalogue {
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ServiceSpec> {
        self.specs.get(name)
    }

    pub fn set_spec(&mut self, name: &str, spec: ServiceSpec) -> Option<ServiceSpec> {
        self.specs.insert(name.to_string(), spec)
    }

    pub fn remove_spec(&mut self, name: &str) -> Option<ServiceSpec> {
        self.specs.remove(name)
    }

    /// Providers declared for `name`, empty if none.
    #[must_use]
    pub fn providers(&self, name: &str) -> BTreeSet<IpAddr> {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    pub fn set_providers(&mut self, name: &str, providers: BTreeSet<IpAddr>) {
        if providers.is_empty() {
            self.providers.remove(name);
        } else {
            self.providers.insert(name.to_string(), providers);
        }
    }

    /// Name of the service, other than `name`, whose spec claims `ip`.
    #[must_use]
    pub fn ip_owner(&self, ip: IpAddr, name: &str) -> Option<&str> {
        self.specs
            .iter()
            .find(|(other, spec)| other.as_str() != name && spec.ip == ip)
            .map(|(other, _)| other.as_str())
    }

    pub fn specs(&self) -> impl Iterator<Item = (&str, &ServiceSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn provider_sets(&self) -> impl Iterator<Item = (&str, &BTreeSet<IpAddr>)> {
        self.providers.iter().map(|(name, set)| (name.as_str(), set))
    }
}
