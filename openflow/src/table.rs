// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow tables of the fabric pipeline and the priorities used within them.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of a flow table in the switch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub u8);

impl TableId {
    /// Vlan mapping
    pub const VLAN: TableId = TableId(1);
    /// Host-local DNAT
    pub const HOST_DNAT: TableId = TableId(2);
    /// Service proxy DNAT (client to service rewritten to client to provider)
    pub const SRV_PROXY_DNAT: TableId = TableId(3);
    /// Destination group lookup
    pub const DST_GRP: TableId = TableId(4);
    /// Security policy
    pub const POLICY: TableId = TableId(5);
    /// Service proxy SNAT (provider to client rewritten to service to client)
    pub const SRV_PROXY_SNAT: TableId = TableId(6);
    /// IP routing
    pub const IP: TableId = TableId(7);
    /// Host-local SNAT
    pub const HOST_SNAT: TableId = TableId(8);
    /// Destination mac lookup
    pub const MAC_DEST: TableId = TableId(9);
}

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority of exact-match flows (NAT pairs).
pub const FLOW_MATCH_PRIORITY: u16 = 100;
/// Priority of flows punting otherwise unmatched traffic to the controller.
/// Above table-miss, below exact matches.
pub const FLOW_FLOOD_PRIORITY: u16 = 10;
/// Priority of table-miss flows.
pub const FLOW_MISS_PRIORITY: u16 = 1;
