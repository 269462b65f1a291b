// Canonical transfer records shared by decoders, crawler and orchestrator

use crate::address::InteropAddress;
use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

pub const NEO_PLATFORM: &str = "neo";
pub const ETHEREUM_PLATFORM: &str = "ethereum";

/// Reserved symbol for native Ethereum value transfers
pub const NATIVE_ETH_SYMBOL: &str = "ETH";

/// One token movement recovered from an external transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropTransfer {
    pub source_platform: String,
    /// Chain-encoded sender address
    pub source_address: String,
    pub destination_platform: String,
    /// Chain-encoded receiving address (the bridge account)
    pub destination_address: String,
    /// Bridge-internal account the depositor wants credited
    pub interop_address: InteropAddress,
    pub symbol: String,
    /// Chain-native smallest unit
    pub amount: U256,
}

/// Decoded external transaction. `hash == None` means "not relevant".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropTransaction {
    pub hash: Option<B256>,
    pub transfers: Vec<InteropTransfer>,
}

impl InteropTransaction {
    pub fn not_relevant() -> Self {
        Self {
            hash: None,
            transfers: Vec::new(),
        }
    }

    pub fn is_relevant(&self) -> bool {
        self.hash.is_some() && !self.transfers.is_empty()
    }
}

/// One fully fetched external block. Always produced, even when empty, so the
/// frontier keeps moving. `hash == None` is the "no relevant tx" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteropBlock {
    pub platform: String,
    pub chain: String,
    pub height: u64,
    pub hash: Option<B256>,
    pub transaction_hashes: Vec<B256>,
}

impl InteropBlock {
    pub fn empty(platform: &str, chain: &str, height: u64) -> Self {
        Self {
            platform: platform.to_string(),
            chain: chain.to_string(),
            height,
            hash: None,
            transaction_hashes: Vec::new(),
        }
    }
}

/// Block plus the decoded relevant transactions it references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    pub block: InteropBlock,
    pub transactions: Vec<InteropTransaction>,
}

impl DecodedBlock {
    pub fn height(&self) -> u64 {
        self.block.height
    }

    pub fn transaction(&self, hash: &B256) -> Option<&InteropTransaction> {
        self.transactions
            .iter()
            .find(|tx| tx.hash.as_ref() == Some(hash))
    }
}

/// Detected, not-yet-settled external deposit. Identity is `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSwap {
    pub platform: String,
    pub hash: B256,
    pub source_address: String,
    /// Interop address to credit
    pub destination_address: String,
}

impl PendingSwap {
    pub fn from_transfer(platform: &str, hash: B256, transfer: &InteropTransfer) -> Self {
        Self {
            platform: platform.to_string(),
            hash,
            source_address: transfer.source_address.clone(),
            destination_address: transfer.interop_address.to_string(),
        }
    }
}

/// Settlement submitted externally, waiting out the debounce window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSettle {
    pub source_hash: B256,
    pub destination_hash: B256,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

/// Query-facing view of a swap, destination hash resolved lazily
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSwap {
    pub source_platform: String,
    pub source_chain: String,
    pub source_hash: B256,
    pub destination_platform: String,
    pub destination_chain: String,
    pub destination_hash: Option<B256>,
}
