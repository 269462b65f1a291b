//! Neo Types
//!
//! Purpose:
//!     The slice of Neo's UTXO/script transaction model the decoder needs,
//!     plus script-hash and Base58Check address helpers.
//!
//! Notes:
//!     - UInt160/UInt256 hold raw (little-endian) bytes as they appear in
//!       scripts; Display shows the conventional reversed hex with 0x
//!     - Address = Base58Check(0x17 || script hash)

use alloy::primitives::{B256, U256};
use ripemd::Ripemd160;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::fmt;

/// Neo 2 address version byte
pub const ADDRESS_VERSION: u8 = 0x17;

/// Transaction attribute usage tag for free-form descriptions
pub const ATTRIBUTE_DESCRIPTION: u8 = 0x90;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UInt160(pub [u8; 20]);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UInt256(pub [u8; 32]);

fn display_hex(raw: &[u8]) -> String {
    let mut reversed = raw.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

fn parse_display_hex<const N: usize>(text: &str) -> Option<[u8; N]> {
    let text = text.trim();
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    let mut bytes: [u8; N] = hex::decode(text).ok()?.try_into().ok()?;
    bytes.reverse();
    Some(bytes)
}

impl UInt160 {
    pub fn from_slice(raw: &[u8]) -> Option<Self> {
        Some(Self(raw.try_into().ok()?))
    }

    /// Parse reversed hex ("0xed07...a7b3")
    pub fn from_display_hex(text: &str) -> Option<Self> {
        parse_display_hex(text).map(Self)
    }

    /// Reversed hex without prefix, the form asset registries use
    pub fn to_display_hex(&self) -> String {
        display_hex(&self.0)
    }

    /// RIPEMD-160(SHA-256(script))
    pub fn from_script(script: &[u8]) -> Self {
        let sha = Sha256::digest(script);
        let ripe = Ripemd160::digest(sha);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&ripe);
        Self(bytes)
    }

    pub fn from_address(address: &str) -> Option<Self> {
        let payload = bs58::decode(address.trim()).with_check(None).into_vec().ok()?;
        if payload.len() != 21 || payload[0] != ADDRESS_VERSION {
            return None;
        }
        Self::from_slice(&payload[1..])
    }

    pub fn to_address(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&self.0);
        bs58::encode(payload).with_check().into_string()
    }
}

impl fmt::Display for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_display_hex())
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt160({})", self)
    }
}

impl UInt256 {
    pub fn from_display_hex(text: &str) -> Option<Self> {
        parse_display_hex(text).map(Self)
    }

    pub fn to_display_hex(&self) -> String {
        display_hex(&self.0)
    }

    /// Canonical hash in display byte order
    pub fn to_b256(&self) -> B256 {
        let mut bytes = self.0;
        bytes.reverse();
        B256::from(bytes)
    }

    pub fn from_b256(hash: &B256) -> Self {
        let mut bytes = hash.0;
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_display_hex())
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({})", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeoTxKind {
    Contract,
    Invocation,
    Other,
}

impl NeoTxKind {
    pub fn from_rpc_name(name: &str) -> Self {
        match name {
            "ContractTransaction" => Self::Contract,
            "InvocationTransaction" => Self::Invocation,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxAttribute {
    pub usage: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub asset_id: UInt256,
    /// Whole-unit decimal value as the node reports it
    pub value: Decimal,
    pub script_hash: UInt160,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeoTransaction {
    pub hash: UInt256,
    pub kind: NeoTxKind,
    pub witnesses: Vec<Witness>,
    pub attributes: Vec<TxAttribute>,
    pub outputs: Vec<TxOutput>,
    /// Invocation script, present only for invocation transactions
    pub script: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeoBlock {
    pub height: u64,
    pub hash: UInt256,
    pub transactions: Vec<NeoTransaction>,
}

/// One `transfer` notification from a transaction's application log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationLogEntry {
    /// Emitting contract, reversed hex
    pub contract: String,
    pub source: Option<UInt160>,
    pub target: Option<UInt160>,
    /// Already scaled to the token's smallest unit
    pub amount: U256,
}
