// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

//! Service proxy of the fabric agent.
//!
//! The proxy turns a virtual service (an address and a set of ports) into
//! load balanced NAT across the service's providers, entirely in the flow
//! tables of the switch. Only the first packet of each client of a service
//! reaches the controller: it selects the least used provider and installs a
//! DNAT/SNAT flow pair per service port for that client.
//!
//! # Example
//!
//! ```
//! use fabric_svc_proxy::{EndpointTable, PortSpec, ProxyParams, ServiceProxy, ServiceSpec};
//! use net::Protocol;
//! use openflow::{DatapathMode, SoftSwitch};
//! use std::sync::Arc;
//!
//! let switch = Arc::new(SoftSwitch::new());
//! let proxy = ServiceProxy::new(switch.clone(), Arc::new(EndpointTable::new()), ProxyParams::default());
//! let next = DatapathMode::Vxlan.service_next_tables();
//! proxy.configure_service_tables(next.dnat_next, next.snat_next).unwrap();
//!
//! let spec = ServiceSpec::new(
//!     "10.254.0.10".parse().unwrap(),
//!     vec![PortSpec::new(Protocol::Tcp, 80, 8080)],
//! );
//! proxy.add_service_spec("web", spec).unwrap();
//! proxy.update_providers("web", ["20.1.1.22".parse().unwrap()]).unwrap();
//!
//! // two table-miss flows and one watch flow
//! assert_eq!(switch.flow_count(), 3);
//! assert!(proxy.resolve_service_proxy_mac("10.254.0.10".parse().unwrap()).is_some());
//! ```

pub mod catalogue;
pub mod directory;
pub mod errors;
pub mod inspect;
pub mod natflow;
mod oper;
mod packet_in;
pub mod params;
mod proxy;
pub mod scheduler;
pub mod stats;

pub use catalogue::{Catalogue, PortSpec, ServiceSpec};
pub use directory::{Endpoint, EndpointDirectory, EndpointTable};
pub use errors::{ConfigError, ProxyError};
pub use inspect::{ProviderDump, ProxyStateDump, ServiceDump};
pub use natflow::{Direction, FlowKey, ServiceTables};
pub use params::{LOOP_SENTINEL_MAC, ProxyParams, ProxyParamsBuilder};
pub use proxy::ServiceProxy;
pub use stats::{EndpointStats, ProviderStats, ServiceStats, StatsPoller};
