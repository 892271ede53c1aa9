// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Datapath modes of the agent.

use crate::table::TableId;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// How a host's datapath forwards overlay traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatapathMode {
    /// Bridged, vlan encapsulated
    #[default]
    Vlan,
    /// Bridged, vxlan encapsulated
    Vxlan,
    /// Routed, vxlan encapsulated
    Vrouter,
    /// Routed, vlan encapsulated
    Vlrouter,
}

/// Tables that service proxy traffic continues to once NAT is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceNextTables {
    /// Continuation of the DNAT table
    pub dnat_next: TableId,
    /// Continuation of the SNAT table
    pub snat_next: TableId,
}

impl DatapathMode {
    /// Continuation tables of the service proxy tables in this mode.
    ///
    /// DNAT always continues to destination group lookup. SNAT continues to
    /// mac lookup when bridging and to IP lookup when routing.
    #[must_use]
    pub const fn service_next_tables(self) -> ServiceNextTables {
        let snat_next = match self {
            DatapathMode::Vlan | DatapathMode::Vxlan => TableId::MAC_DEST,
            DatapathMode::Vrouter | DatapathMode::Vlrouter => TableId::IP,
        };
        ServiceNextTables {
            dnat_next: TableId::DST_GRP,
            snat_next,
        }
    }

    /// Name of the mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DatapathMode::Vlan => "vlan",
            DatapathMode::Vxlan => "vxlan",
            DatapathMode::Vrouter => "vrouter",
            DatapathMode::Vlrouter => "vlrouter",
        }
    }
}

impl Display for DatapathMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A datapath mode name which is not known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown datapath mode '{0}' (expected vlan, vxlan, vrouter or vlrouter)")]
pub struct UnknownDatapathMode(pub String);

impl FromStr for DatapathMode {
    type Err = UnknownDatapathMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vlan" => Ok(DatapathMode::Vlan),
            "vxlan" => Ok(DatapathMode::Vxlan),
            "vrouter" => Ok(DatapathMode::Vrouter),
            "vlrouter" => Ok(DatapathMode::Vlrouter),
            _ => Err(UnknownDatapathMode(s.to_string())),
        }
    }
}
