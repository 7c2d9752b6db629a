use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A six-byte Bluetooth device address.
///
/// The canonical text form is `XX:XX:XX:XX:XX:XX`,
/// most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BdAddr([u8; 6]);

/// The text form could not be parsed as a Bluetooth address.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a valid Bluetooth address")]
pub struct ParseAddrError(String);

impl BdAddr {
    /// The all-zero address, which adapters use to mean "any".
    pub const ANY: Self = Self([0; 6]);

    /// An address from raw bytes, most significant first.
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl Display for BdAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = ParseAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');

        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseAddrError(s.into()))?;
            if part.len() != 2 {
                return Err(ParseAddrError(s.into()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseAddrError(s.into()))?;
        }

        if parts.next().is_some() {
            return Err(ParseAddrError(s.into()));
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BdAddr {
    type Error = ParseAddrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BdAddr> for String {
    fn from(addr: BdAddr) -> Self {
        addr.to_string()
    }
}
