// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

//! Flow-table facade of the fabric agent.
//!
//! The agent programs the switch through the [`OfSwitch`] trait. Flows are
//! described by a [`FlowEntry`] (table, priority, [`FlowMatch`], set-field
//! actions and a [`Next`] step) and identified, once installed, by the
//! [`FlowId`] (cookie) the switch assigned them.
//!
//! [`SoftSwitch`] is an in-memory switch used by tests and by the agent when
//! no real datapath is attached.

mod display;
pub mod flow;
pub mod message;
pub mod mode;
pub mod soft;
pub mod switch;
pub mod table;

pub use flow::{Flow, FlowEntry, FlowId, FlowMatch, Next, SetField};
pub use message::{
    FlowStats, FlowStatsRequest, MultipartReply, PacketIn, PacketOut, PortStats, PseudoPort,
};
pub use mode::{DatapathMode, ServiceNextTables, UnknownDatapathMode};
pub use soft::SoftSwitch;
pub use switch::{OfSwitch, SwitchError};
pub use table::{FLOW_FLOOD_PRIORITY, FLOW_MATCH_PRIORITY, FLOW_MISS_PRIORITY, TableId};
