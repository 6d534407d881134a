//! # Domain Entities
//!
//! Wallet identities and signatures exchanged in `tx-*` headers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::ProtocolError;

/// Ethereum-style address (last 20 bytes of keccak256 of the public key).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = strip_hex_prefix(trimmed);
        let bytes = hex::decode(digits).map_err(|_| ProtocolError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidAddress(s.to_string()))?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Recoverable secp256k1 signature in the 65-byte `r || s || v` wallet layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSignature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery byte (27 or 28 when produced here)
    pub v: u8,
}

impl WalletSignature {
    /// Encoded length in bytes.
    pub const LEN: usize = 65;

    /// Serialize as `r || s || v`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// Parse from `r || s || v`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != Self::LEN {
            return Err(ProtocolError::InvalidSignatureEncoding);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parse hex with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ProtocolError> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|_| ProtocolError::InvalidSignatureEncoding)?;
        Self::from_bytes(&bytes)
    }
}

/// Authentication scheme announced in the `tx-protocol` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Signature over the nonce string only.
    V1,
    /// Signature over the canonical request message.
    #[default]
    V2,
}

impl ProtocolVersion {
    /// Header value for this version.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "1",
            ProtocolVersion::V2 => "2",
        }
    }

    /// Parse an optional `tx-protocol` header value; absent means V2.
    pub fn from_header(value: Option<&str>) -> Result<Self, ProtocolError> {
        match value.map(str::trim) {
            None | Some("") | Some("2") => Ok(ProtocolVersion::V2),
            Some("1") => Ok(ProtocolVersion::V1),
            Some(other) => Err(ProtocolError::UnsupportedVersion(other.to_string())),
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
