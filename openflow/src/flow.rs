// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow descriptions.

use crate::table::TableId;
use net::{Mac, Protocol};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Ethertype for IPv4, as matched by flows.
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// Cookie the switch assigned to an installed flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub u64);

/// Fields to match against. `None` means wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FlowMatch {
    /// Ingress port
    pub in_port: Option<u32>,
    /// Ethertype
    pub eth_type: Option<u16>,
    /// L4 protocol (implies IPv4)
    pub ip_proto: Option<Protocol>,
    /// IP source
    pub ip_src: Option<IpAddr>,
    /// IP destination
    pub ip_dst: Option<IpAddr>,
    /// L4 source port
    pub l4_src: Option<u16>,
    /// L4 destination port
    pub l4_dst: Option<u16>,
}

impl FlowMatch {
    /// A match on every IPv4 packet of the given protocol.
    #[must_use]
    pub fn ipv4(proto: Protocol) -> FlowMatch {
        FlowMatch {
            eth_type: Some(ETH_TYPE_IPV4),
            ip_proto: Some(proto),
            ..FlowMatch::default()
        }
    }

    /// True if the match pins an L4 port.
    #[must_use]
    pub fn has_l4_port(&self) -> bool {
        self.l4_src.is_some() || self.l4_dst.is_some()
    }
}

/// A header rewrite applied by a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SetField {
    /// Rewrite ethernet destination
    EthDst(Mac),
    /// Rewrite IP source
    IpSrc(IpAddr),
    /// Rewrite IP destination
    IpDst(IpAddr),
    /// Rewrite L4 source port
    L4Src(Protocol, u16),
    /// Rewrite L4 destination port
    L4Dst(Protocol, u16),
}

/// What happens to a packet once a flow's rewrites have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Next {
    /// Continue lookup in another table
    GotoTable(TableId),
    /// Punt to the controller
    Controller,
    /// Drop
    Drop,
}

/// A flow as handed to the switch for installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FlowEntry {
    /// Table the flow lives in
    pub table: TableId,
    /// Flow priority, higher wins
    pub priority: u16,
    /// Match fields
    pub matcher: FlowMatch,
    /// Rewrites, applied in order
    pub set_fields: Vec<SetField>,
    /// Continuation
    pub next: Next,
}

/// Handle to an installed flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flow {
    /// Switch cookie
    pub id: FlowId,
    /// What was installed
    pub entry: FlowEntry,
}
