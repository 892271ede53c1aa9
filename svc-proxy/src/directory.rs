// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Endpoint directory seam.
//!
//! The proxy only asks two questions of the directory: who is attached to a
//! switch port, and is a given address known on a given vlan.

use net::Mac;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// A workload attached to the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub mac: Mac,
    pub vlan: u16,
    /// Switch port of a local endpoint, `None` for remote ones.
    #[serde(default)]
    pub port: Option<u32>,
}

/// Lookups the proxy performs against the endpoint directory.
pub trait EndpointDirectory: Send + Sync {
    /// The local endpoint attached to switch port `port`.
    fn local_endpoint_by_port(&self, port: u32) -> Option<Endpoint>;
    /// The endpoint with address `ip` on vlan `vlan`, local or remote.
    fn endpoint_by_ip_vlan(&self, ip: IpAddr, vlan: u16) -> Option<Endpoint>;
}

/// In-memory [`EndpointDirectory`].
#[derive(Debug, Default)]
pub struct EndpointTable {
    by_port: RwLock<HashMap<u32, Endpoint>>,
    by_ip_vlan: RwLock<HashMap<(IpAddr, u16), Endpoint>>,
}

impl EndpointTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an endpoint. Endpoints with a port are also indexed
    /// by port.
    pub fn add(&self, endpoint: Endpoint) {
        if let Some(port) = endpoint.port {
            self.by_port.write().insert(port, endpoint);
        }
        self.by_ip_vlan
            .write()
            .insert((endpoint.ip, endpoint.vlan), endpoint);
    }

    /// Remove an endpoint. Returns it if it was known.
    pub fn remove(&self, ip: IpAddr, vlan: u16) -> Option<Endpoint> {
        let endpoint = self.by_ip_vlan.write().remove(&(ip, vlan))?;
        if let Some(port) = endpoint.port {
            let mut by_port = self.by_port.write();
            if by_port.get(&port).is_some_and(|e| e.ip == ip) {
                by_port.remove(&port);
            }
        }
        Some(endpoint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_ip_vlan.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EndpointDirectory for EndpointTable {
    fn local_endpoint_by_port(&self, port: u32) -> Option<Endpoint> {
        self.by_port.read().get(&port).copied()
    }

    fn endpoint_by_ip_vlan(&self, ip: IpAddr, vlan: u16) -> Option<Endpoint> {
        self.by_ip_vlan.read().get(&(ip, vlan)).copied()
    }
}
