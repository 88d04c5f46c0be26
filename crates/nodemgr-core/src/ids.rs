//! Core identifier types for the node manager.
//!
//! Group IDs are assigned by whoever creates the group on the chain; front IDs
//! are assigned by the store when a front registers. Both are positive
//! integers and encode to fixed-width big-endian bytes so that store keys
//! sort numerically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a consensus group.
///
/// Zero is reserved and never a valid group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct GroupId(u32);

impl GroupId {
    /// Create a `GroupId`, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Zero` if `value` is zero.
    pub const fn new(value: u32) -> Result<Self, IdError> {
        if value == 0 {
            return Err(IdError::Zero);
        }
        Ok(Self(value))
    }

    /// Return the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Big-endian key encoding.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from a big-endian key segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes encode zero.
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Result<Self, IdError> {
        Self::new(u32::from_be_bytes(bytes))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<u32>().map_err(|_| IdError::InvalidNumber)?;
        Self::new(value)
    }
}

impl TryFrom<u32> for GroupId {
    type Error = IdError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupId> for u32 {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

/// Identifier of a registered front agent.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FrontId(u32);

impl FrontId {
    /// Create a `FrontId`, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Zero` if `value` is zero.
    pub const fn new(value: u32) -> Result<Self, IdError> {
        if value == 0 {
            return Err(IdError::Zero);
        }
        Ok(Self(value))
    }

    /// Return the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Big-endian key encoding.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from a big-endian key segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes encode zero.
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Result<Self, IdError> {
        Self::new(u32::from_be_bytes(bytes))
    }
}

impl fmt::Debug for FrontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrontId({})", self.0)
    }
}

impl fmt::Display for FrontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FrontId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<u32>().map_err(|_| IdError::InvalidNumber)?;
        Self::new(value)
    }
}

impl TryFrom<u32> for FrontId {
    type Error = IdError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FrontId> for u32 {
    fn from(id: FrontId) -> Self {
        id.0
    }
}

/// Network address of a front agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrontAddr {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl FrontAddr {
    /// Create an address, rejecting an empty host or port zero.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidAddr` if the host is blank or the port is zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, IdError> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty() || trimmed.contains(['/', ' ']) || port == 0 {
            return Err(IdError::InvalidAddr(format!("{host}:{port}")));
        }
        Ok(Self {
            host: trimmed.to_string(),
            port,
        })
    }

    /// Base URL of the front's HTTP API, e.g. `http://10.0.0.1:8081/WeBASE-Front`.
    #[must_use]
    pub fn base_url(&self, base_path: &str) -> String {
        let base_path = base_path.trim_matches('/');
        if base_path.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{base_path}", self.host, self.port)
        }
    }
}

impl fmt::Display for FrontAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for FrontAddr {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| IdError::InvalidAddr(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| IdError::InvalidAddr(s.to_string()))?;
        Self::new(host, port)
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The value is not a valid unsigned integer.
    #[error("not a valid number")]
    InvalidNumber,

    /// Zero is reserved.
    #[error("identifier must be positive")]
    Zero,

    /// The address is not a usable `host:port`.
    #[error("invalid front address: {0}")]
    InvalidAddr(String),
}
