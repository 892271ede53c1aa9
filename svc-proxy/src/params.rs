// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Service proxy parameters

use derive_builder::Builder;
use net::Mac;
use openflow::TableId;
use std::fmt::Display;
use std::time::Duration;

/// Source mac stamped on frames the proxy re-injects. A punted frame carrying
/// it has already been through the proxy once.
pub const LOOP_SENTINEL_MAC: Mac = Mac([0x00, 0x00, 0x11, 0x11, 0x11, 0x11]);

/// Delay between proxy start and the first flow stats request.
pub const DEFAULT_STATS_WARMUP: Duration = Duration::from_secs(20);

/// Delay between two flow stats requests.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Struct to configure the service proxy. N.B we derive a builder type
/// `ProxyParamsBuilder` and provide defaults for each field.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct ProxyParams {
    #[builder(setter(into), default = TableId::SRV_PROXY_DNAT)]
    pub dnat_table: TableId,

    #[builder(setter(into), default = TableId::SRV_PROXY_SNAT)]
    pub snat_table: TableId,

    #[builder(setter(into), default = LOOP_SENTINEL_MAC)]
    pub loop_sentinel: Mac,

    #[builder(setter(into), default = DEFAULT_STATS_WARMUP)]
    pub stats_warmup: Duration,

    #[builder(setter(into), default = DEFAULT_STATS_INTERVAL)]
    pub stats_interval: Duration,
}

impl Default for ProxyParams {
    fn default() -> Self {
        Self {
            dnat_table: TableId::SRV_PROXY_DNAT,
            snat_table: TableId::SRV_PROXY_SNAT,
            loop_sentinel: LOOP_SENTINEL_MAC,
            stats_warmup: DEFAULT_STATS_WARMUP,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

impl Display for ProxyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "Service proxy config")?;
        writeln!(f, "  DNAT table    : {}", self.dnat_table)?;
        writeln!(f, "  SNAT table    : {}", self.snat_table)?;
        writeln!(f, "  loop sentinel : {}", self.loop_sentinel)?;
        writeln!(f, "  stats warm-up : {:?}", self.stats_warmup)?;
        writeln!(f, "  stats interval: {:?}", self.stats_interval)
    }
}
