// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The switch seam.

use crate::flow::{FlowEntry, FlowId};
use crate::message::{FlowStatsRequest, PacketOut};
use crate::table::TableId;

/// Errors reported by a switch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwitchError {
    /// No connection to the switch
    #[error("switch is disconnected")]
    Disconnected,
    /// The switch refused the request
    #[error("switch rejected flow in table {table}: {reason}")]
    Rejected {
        /// Table of the refused flow
        table: TableId,
        /// Reason given by the switch
        reason: String,
    },
    /// The flow is not installed
    #[error("no flow with cookie {0}")]
    NoSuchFlow(FlowId),
    /// The table does not exist on this switch
    #[error("no such table {0}")]
    NoSuchTable(TableId),
}

/// Operations the agent needs from an OpenFlow switch.
///
/// All calls are synchronous from the caller's point of view: once
/// `install_flow` returns, the flow is (or will be, in order) in the switch.
/// Counter replies to [`OfSwitch::send_stats_request`] come back
/// asynchronously through the owner of the switch connection.
pub trait OfSwitch: Send + Sync {
    /// Install a flow, returning its cookie.
    ///
    /// # Errors
    ///
    /// Returns a [`SwitchError`] if the switch is unreachable or refuses the flow.
    fn install_flow(&self, entry: FlowEntry) -> Result<FlowId, SwitchError>;

    /// Delete an installed flow.
    ///
    /// # Errors
    ///
    /// Returns a [`SwitchError`] if the switch is unreachable or the flow is unknown.
    fn delete_flow(&self, id: FlowId) -> Result<(), SwitchError>;

    /// Inject a packet.
    ///
    /// # Errors
    ///
    /// Returns a [`SwitchError`] if the switch is unreachable.
    fn send_packet_out(&self, packet: PacketOut) -> Result<(), SwitchError>;

    /// Ask for the counters of every flow in a table.
    ///
    /// # Errors
    ///
    /// Returns a [`SwitchError`] if the switch is unreachable.
    fn send_stats_request(&self, request: FlowStatsRequest) -> Result<(), SwitchError>;
}
