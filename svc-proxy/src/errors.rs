// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Service proxy errors

use net::Protocol;
use openflow::SwitchError;
use std::net::IpAddr;

/// A service specification that cannot be realized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported protocol '{0}': only TCP and UDP services are supported")]
    UnsupportedProtocol(String),
    #[error("invalid port mapping {protocol} {service_port}->{provider_port}: ports must be non-zero")]
    InvalidPort {
        protocol: Protocol,
        service_port: u16,
        provider_port: u16,
    },
    #[error("unsupported service address {0}: only IPv4 is supported")]
    UnsupportedAddress(IpAddr),
    #[error("duplicate port {protocol} {service_port}")]
    DuplicatePort { protocol: Protocol, service_port: u16 },
}

/// Errors of the service proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no provider available for service {0}")]
    NoProviderAvailable(IpAddr),
    #[error("service '{service}': failed to install flow {flow}: {source}")]
    FlowInstall {
        service: String,
        flow: String,
        #[source]
        source: SwitchError,
    },
    #[error("service '{service}': failed to remove flow {flow}: {source}")]
    FlowRemove {
        service: String,
        flow: String,
        #[source]
        source: SwitchError,
    },
    #[error("no such service '{0}'")]
    NoSuchService(String),
    #[error("service ip {ip} is already used by service '{owner}'")]
    ServiceIpInUse { ip: IpAddr, owner: String },
    #[error("service proxy tables are not configured")]
    TablesNotConfigured,
    #[error(transparent)]
    Switch(#[from] SwitchError),
}
