// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Network primitives shared by the fabric agent crates.
//!
//! This crate only knows about the small slice of the network stack that the
//! service proxy needs: mac addresses, the L4 protocols a service may expose,
//! and read/patch access to the ethernet/IPv4 headers of frames punted to the
//! controller.

pub mod eth;
pub mod frame;
pub mod proto;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use eth::mac::Mac;
pub use frame::{FrameError, FrameSummary};
pub use proto::Protocol;
