// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use std::fmt::Display;
use std::str::FromStr;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]`. It serializes to and from
/// its colon separated textual form so that it can be written as-is in
/// configuration files.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl FromStr for Mac {
    type Err = MacFromStringError;

    /// Parses `aa:bb:cc:dd:ee:ff`. Octets of a single hex digit (`2:2:a:b:c:d`)
    /// are accepted since that is how switches commonly print them.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MacFromStringError::Invalid(value.to_string());
        let mut octets = [0u8; 6];
        let mut count = 0usize;
        for octet_str in value.split(':') {
            if count == octets.len()
                || octet_str.is_empty()
                || octet_str.len() > 2
                || !octet_str.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(octet_str, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != octets.len() {
            return Err(invalid());
        }
        Ok(Mac(octets))
    }
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mac> for String {
    fn from(value: Mac) -> Self {
        value.to_string()
    }
}

impl Mac {
    /// The broadcast `Mac`
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    ///
    /// Frames carrying a zero source are synthetic: they were built by the
    /// agent itself and never came off a wire.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the least significant bit of the first octet of the `[Mac]` is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Returns true iff the second least significant bit of the first octet is one.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_and_display() {
        let mac: Mac = "00:00:11:11:11:11".parse().unwrap();
        assert_eq!(mac, Mac([0, 0, 0x11, 0x11, 0x11, 0x11]));
        assert_eq!(mac.to_string(), "00:00:11:11:11:11");
    }

    #[test]
    fn parse_short_octets() {
        let mac: Mac = "2:2:a:b:c:d".parse().unwrap();
        assert_eq!(mac, Mac([2, 2, 0x0a, 0x0b, 0x0c, 0x0d]));
    }

    #[test]
    fn reject_garbage() {
        for bad in ["", "00:11", "00:11:22:33:44:55:66", "zz:00:00:00:00:00", "000:0:0:0:0:0", "0::0:0:0:0"] {
            assert!(bad.parse::<Mac>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn display_parse_consistent() {
        bolero::check!().with_type::<[u8; 6]>().for_each(|octets| {
            let mac = Mac(*octets);
            assert_eq!(mac.to_string().parse::<Mac>().unwrap(), mac);
        });
    }

    #[test]
    fn predicates() {
        assert!(Mac::ZERO.is_zero());
        assert!(Mac::BROADCAST.is_broadcast());
        assert!(Mac::BROADCAST.is_multicast());
        assert!(Mac([0x02, 0x02, 0, 0, 0, 1]).is_local());
        assert!(!Mac([0x00, 0x00, 0x11, 0x11, 0x11, 0x11]).is_local());
    }
}
