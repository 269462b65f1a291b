//! Ethereum block data as the bridge sees it
//!
//! Only the fields the crawler matches on are kept. `AlloyEthChain` fills
//! these from RPC blocks and `Transfer` logs; tests build them directly.

use alloy::primitives::{Address, Bytes, B256, U256};

/// Chain name Ethereum blocks are recorded under
pub const ETH_CHAIN: &str = "ethereum";

/// Decoded ERC20 `Transfer(from, to, value)` log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    /// Token contract that emitted the event
    pub contract: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthTransaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    /// Compressed sender key, when the node adapter can recover it
    pub sender_public_key: Option<[u8; 33]>,
    pub transfer_logs: Vec<TransferLog>,
}

impl EthTransaction {
    /// Every address this transaction pays: the call target and each
    /// `Transfer` recipient
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(self.transfer_logs.iter().map(|log| &log.to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthBlock {
    pub number: u64,
    pub hash: B256,
    pub transactions: Vec<EthTransaction>,
}
