// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Transport protocols a service may expose.

use std::fmt::Display;
use std::str::FromStr;

/// An L4 protocol supported by the service proxy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    /// Transmission control protocol
    Tcp,
    /// User datagram protocol
    Udp,
}

/// A protocol name which does not map to a [`Protocol`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported protocol '{0}'")]
pub struct UnsupportedProtocol(pub String);

impl Protocol {
    /// IANA protocol number as carried in the IPv4 `protocol` field.
    #[must_use]
    pub const fn ip_number(self) -> u8 {
        match self {
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
        }
    }

    /// Map an IPv4 `protocol` field back to a [`Protocol`], if supported.
    #[must_use]
    pub const fn from_ip_number(number: u8) -> Option<Protocol> {
        match number {
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }

    /// Upper-case name (`TCP`/`UDP`)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }

    /// Lower-case name as used in switch flow dumps (`tcp`/`udp`)
    #[must_use]
    pub const fn flow_keyword(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = UnsupportedProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Protocol::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Protocol::Udp)
        } else {
            Err(UnsupportedProtocol(s.to_string()))
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = UnsupportedProtocol;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.as_str().to_string()
    }
}
