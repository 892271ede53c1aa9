// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet types

pub mod mac;

/// Length in bytes of an untagged ethernet II header.
pub const ETH_HEADER_LEN: usize = 14;

/// Length in bytes of an 802.1Q tag.
pub const VLAN_TAG_LEN: usize = 4;

/// Ethertype of an 802.1Q tagged frame.
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// Ethertype of IPv4.
pub const ETHERTYPE_IPV4: u16 = 0x0800;
