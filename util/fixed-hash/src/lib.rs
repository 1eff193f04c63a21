//! The 32-byte fixed-length hash type used for block IDs, transaction IDs,
//! accounts, and state roots.
//!
//! Hex rendering always carries a `0x` prefix; parsing accepts the prefix as
//! optional.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The errors for converting data into [`H256`].
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum FromStrError {
    /// Input contains an invalid hex character.
    #[error("invalid hex character at {0}")]
    InvalidCharacter(usize),
    /// Input has the wrong length.
    #[error("invalid length: {0} (expected 64 hex digits)")]
    InvalidLength(usize),
}

/// The 32-byte fixed-length binary data, interpreted as a big-endian hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct H256(pub [u8; 32]);

impl H256 {
    /// The all-zeros hash, used as the parent of the genesis block.
    pub const fn zero() -> Self {
        H256([0; 32])
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// The inner bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// Converts an exactly 32-byte slice; fails on any other length.
    pub fn from_slice(input: &[u8]) -> Result<Self, FromStrError> {
        if input.len() != 32 {
            return Err(FromStrError::InvalidLength(input.len()));
        }
        let mut inner = [0u8; 32];
        inner.copy_from_slice(input);
        Ok(H256(inner))
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl AsRef<[u8]> for H256 {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::LowerHex for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hex = [0u8; 64];
        faster_hex::hex_encode(&self.0, &mut hex).map_err(|_| fmt::Error)?;
        let hex = std::str::from_utf8(&hex[..]).map_err(|_| fmt::Error)?;
        if f.alternate() {
            write!(f, "0x{hex}")
        } else {
            write!(f, "{hex}")
        }
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:#x}")
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({self:#x})")
    }
}

impl FromStr for H256 {
    type Err = FromStrError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let hex = input.strip_prefix("0x").unwrap_or(input);
        if hex.len() != 64 {
            return Err(FromStrError::InvalidLength(hex.len()));
        }
        if let Some(position) = hex.bytes().position(|byte| !byte.is_ascii_hexdigit()) {
            return Err(FromStrError::InvalidCharacter(position));
        }
        let mut inner = [0u8; 32];
        faster_hex::hex_decode(hex.as_bytes(), &mut inner)
            .map_err(|_| FromStrError::InvalidLength(hex.len()))?;
        Ok(H256(inner))
    }
}

impl Serialize for H256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{self:#x}"))
    }
}

impl<'de> Deserialize<'de> for H256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}
