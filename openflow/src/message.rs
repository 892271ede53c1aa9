// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Asynchronous messages exchanged with the switch.

use crate::flow::{FlowId, FlowMatch};
use crate::table::TableId;

/// A packet punted to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// Table whose flow sent the packet up
    pub table: TableId,
    /// Port the packet entered the switch on
    pub in_port: u32,
    /// The full frame
    pub data: Vec<u8>,
}

/// Output port of a packet-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoPort {
    /// Submit to the first table of the pipeline
    Table,
    /// Send out of a given port
    Physical(u32),
    /// Send back out of the ingress port
    InPort,
}

/// A packet injected by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// Ingress port the switch should assume
    pub in_port: u32,
    /// The full frame
    pub data: Vec<u8>,
    /// Where the frame goes
    pub output: PseudoPort,
}

/// Request for the counters of all flows of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatsRequest {
    /// Table to dump
    pub table: TableId,
}

/// Counters of one flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStats {
    /// Flow cookie
    pub cookie: FlowId,
    /// Table the flow lives in
    pub table: TableId,
    /// Flow priority
    pub priority: u16,
    /// Match of the flow
    pub matcher: FlowMatch,
    /// Packets matched since install
    pub packet_count: u64,
    /// Bytes matched since install
    pub byte_count: u64,
}

/// Counters of one switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStats {
    /// Port number
    pub port: u32,
    /// Packets received
    pub rx_packets: u64,
    /// Packets sent
    pub tx_packets: u64,
}

/// Reply to a statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartReply {
    /// Per flow counters
    Flow(Vec<FlowStats>),
    /// Per port counters
    Port(Vec<PortStats>),
}
