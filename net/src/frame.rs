// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Read-only inspection of frames punted to the controller, plus the one
//! in-place patch the agent performs before re-injecting them.

use crate::eth::mac::Mac;
use crate::eth::{ETH_HEADER_LEN, ETHERTYPE_IPV4, ETHERTYPE_VLAN, VLAN_TAG_LEN};
use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice};
use std::net::Ipv4Addr;
use tracing::trace;

/// Errors which may occur while inspecting a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame is too short to hold the expected headers.
    #[error("frame truncated: {0}")]
    Truncated(String),
    /// The frame does not carry IPv4.
    #[error("not an IPv4 frame (ethertype {0:#06x})")]
    NotIpv4(u16),
    /// The IPv4 header is malformed.
    #[error("invalid IPv4 header: {0}")]
    InvalidIpv4(String),
}

/// The fields of a punted frame the service proxy cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSummary {
    /// Ethernet source
    pub src_mac: Mac,
    /// Ethernet destination
    pub dst_mac: Mac,
    /// 802.1Q vlan id, if the frame is tagged
    pub vlan: Option<u16>,
    /// IPv4 source
    pub src_ip: Ipv4Addr,
    /// IPv4 destination
    pub dst_ip: Ipv4Addr,
    /// IPv4 protocol number
    pub ip_protocol: u8,
}

impl FrameSummary {
    /// Inspect the ethernet and IPv4 headers of `frame`.
    ///
    /// A single 802.1Q tag is skipped over (and reported in [`FrameSummary::vlan`]).
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if the frame is truncated, not IPv4, or carries
    /// a malformed IPv4 header.
    pub fn parse(frame: &[u8]) -> Result<FrameSummary, FrameError> {
        let eth = Ethernet2HeaderSlice::from_slice(frame)
            .map_err(|e| FrameError::Truncated(e.to_string()))?;
        let mut ether_type = eth.ether_type().0;
        let mut offset = ETH_HEADER_LEN;
        let mut vlan = None;

        if ether_type == ETHERTYPE_VLAN {
            let tag = frame
                .get(offset..offset + VLAN_TAG_LEN)
                .ok_or_else(|| FrameError::Truncated("vlan tag".to_string()))?;
            vlan = Some(u16::from_be_bytes([tag[0], tag[1]]) & 0x0fff);
            ether_type = u16::from_be_bytes([tag[2], tag[3]]);
            offset += VLAN_TAG_LEN;
        }

        if ether_type != ETHERTYPE_IPV4 {
            trace!("skipping frame with ethertype {ether_type:#06x}");
            return Err(FrameError::NotIpv4(ether_type));
        }

        let ip = Ipv4HeaderSlice::from_slice(&frame[offset..])
            .map_err(|e| FrameError::InvalidIpv4(e.to_string()))?;

        Ok(FrameSummary {
            src_mac: Mac(eth.source()),
            dst_mac: Mac(eth.destination()),
            vlan,
            src_ip: ip.source_addr(),
            dst_ip: ip.destination_addr(),
            ip_protocol: ip.protocol().0,
        })
    }
}

/// Overwrite the ethernet source of `frame` with `mac`.
///
/// # Errors
///
/// Returns [`FrameError::Truncated`] if `frame` is shorter than an ethernet header.
pub fn set_source_mac(frame: &mut [u8], mac: Mac) -> Result<(), FrameError> {
    if frame.len() < ETH_HEADER_LEN {
        return Err(FrameError::Truncated(format!(
            "{} bytes, need {ETH_HEADER_LEN}",
            frame.len()
        )));
    }
    frame[6..12].copy_from_slice(mac.as_ref());
    Ok(())
}
