// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frame builders for tests.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use crate::eth::mac::Mac;
use etherparse::PacketBuilder;
use std::net::Ipv4Addr;

const PAYLOAD: &[u8] = b"svc";

/// Build an untagged ethernet/IPv4/TCP frame.
#[must_use]
pub fn tcp_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(src_mac.0, dst_mac.0)
        .ipv4(src_ip.octets(), dst_ip.octets(), 64)
        .tcp(src_port, dst_port, 1, 4096);
    let mut frame = Vec::with_capacity(builder.size(PAYLOAD.len()));
    builder
        .write(&mut frame, PAYLOAD)
        .expect("writing into a Vec does not fail");
    frame
}

/// Build an untagged ethernet/IPv4/UDP frame.
#[must_use]
pub fn udp_frame(
    src_mac: Mac,
    dst_mac: Mac,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(src_mac.0, dst_mac.0)
        .ipv4(src_ip.octets(), dst_ip.octets(), 64)
        .udp(src_port, dst_port);
    let mut frame = Vec::with_capacity(builder.size(PAYLOAD.len()));
    builder
        .write(&mut frame, PAYLOAD)
        .expect("writing into a Vec does not fail");
    frame
}
