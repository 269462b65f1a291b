//! Bridge Interop Addresses
//!
//! Purpose:
//!     The bridge-internal address a depositor wants credited. 34 bytes:
//!     one kind byte followed by a 33-byte payload (compressed public key for
//!     user addresses). Text form is a kind prefix plus Base58 of the bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 34;
pub const PUBLIC_KEY_LEN: usize = 33;

/// Neo single-signature verification script: PUSHBYTES33 <key> CHECKSIG
const PUSHBYTES33: u8 = 0x21;
const CHECKSIG: u8 = 0xac;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    User = 1,
    System = 2,
    Interop = 3,
}

impl AddressKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::User),
            2 => Some(Self::System),
            3 => Some(Self::Interop),
            _ => None,
        }
    }

    fn prefix(&self) -> char {
        match self {
            Self::User => 'P',
            Self::System => 'S',
            Self::Interop => 'X',
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'P' => Some(Self::User),
            'S' => Some(Self::System),
            'X' => Some(Self::Interop),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InteropAddress([u8; ADDRESS_LEN]);

impl InteropAddress {
    /// User address owned by a compressed secp256r1/k1 public key.
    pub fn from_public_key(key: &[u8]) -> Option<Self> {
        if key.len() != PUBLIC_KEY_LEN {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = AddressKind::User as u8;
        bytes[1..].copy_from_slice(key);
        Some(Self(bytes))
    }

    /// Recover the signer's address from a single-signature verification script.
    pub fn from_verification_script(script: &[u8]) -> Option<Self> {
        if script.len() != PUBLIC_KEY_LEN + 2
            || script[0] != PUSHBYTES33
            || script[PUBLIC_KEY_LEN + 1] != CHECKSIG
        {
            return None;
        }
        Self::from_public_key(&script[1..=PUBLIC_KEY_LEN])
    }

    /// Parse the text form. Returns None for anything that is not a syntactically
    /// valid address.
    pub fn from_text(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        let kind = AddressKind::from_prefix(chars.next()?)?;
        let decoded = bs58::decode(chars.as_str()).into_vec().ok()?;
        if decoded.len() != ADDRESS_LEN || decoded[0] != kind as u8 {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&decoded);
        Some(Self(bytes))
    }

    pub fn kind(&self) -> AddressKind {
        // Constructors only admit known kinds
        AddressKind::from_byte(self.0[0]).unwrap_or(AddressKind::User)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for InteropAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind().prefix(), bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for InteropAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteropAddress({})", self)
    }
}

impl FromStr for InteropAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s).ok_or_else(|| format!("invalid interop address: {}", s))
    }
}

impl Serialize for InteropAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InteropAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn test_key(seed: u8) -> [u8; PUBLIC_KEY_LEN] {
    let mut key = [seed; PUBLIC_KEY_LEN];
    key[0] = 0x02;
    key
}

#[cfg(test)]
pub(crate) fn test_verification_script(seed: u8) -> Vec<u8> {
    let mut script = vec![PUSHBYTES33];
    script.extend_from_slice(&test_key(seed));
    script.push(CHECKSIG);
    script
}
