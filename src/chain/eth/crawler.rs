//! Ethereum Block Crawler
//!
//! Purpose:
//!     Match transactions paying a watched address and buffer them until the
//!     owner extracts interop transfers. The buffer is shared between the
//!     block-processing step and extraction; both hold the same lock, and
//!     extraction drains it.

use super::decoder::{decode_transaction, EthDecodeContext};
use super::types::{EthBlock, EthTransaction};
use crate::types::InteropTransfer;
use alloy::primitives::{Address, B256};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Block hash -> tx hash -> transfers
pub type InteropTransfers = BTreeMap<B256, BTreeMap<B256, Vec<InteropTransfer>>>;

#[derive(Debug, Clone)]
struct MatchedTransaction {
    block_number: u64,
    block_hash: B256,
    tx: EthTransaction,
}

pub struct EthBlockCrawler {
    watched: HashSet<Address>,
    buffer: Mutex<Vec<MatchedTransaction>>,
}

impl EthBlockCrawler {
    pub fn new(watched: impl IntoIterator<Item = Address>) -> Self {
        Self {
            watched: watched.into_iter().collect(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn is_watched(&self, tx: &EthTransaction) -> bool {
        tx.recipients().any(|to| self.watched.contains(to))
    }

    /// Buffer every matching transaction of `block`. Returns how many matched.
    pub fn process_block(&self, block: &EthBlock) -> usize {
        let matched: Vec<MatchedTransaction> = block
            .transactions
            .iter()
            .filter(|tx| self.is_watched(tx))
            .map(|tx| MatchedTransaction {
                block_number: block.number,
                block_hash: block.hash,
                tx: tx.clone(),
            })
            .collect();

        let count = matched.len();
        if count > 0 {
            debug!("Ethereum block {}: {} matched transactions", block.number, count);
            self.buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(matched);
        }
        count
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Decode and drain the buffer. Transactions without transfers to the
    /// swap address leave no entry.
    pub fn extract_interop_transfers(&self, ctx: &EthDecodeContext<'_>) -> InteropTransfers {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result = InteropTransfers::new();

        for matched in buffer.drain(..) {
            let decoded = decode_transaction(&matched.tx, ctx);
            if !decoded.is_relevant() {
                continue;
            }
            debug!(
                "Ethereum block {} tx {}: {} transfers",
                matched.block_number,
                matched.tx.hash,
                decoded.transfers.len()
            );
            result
                .entry(matched.block_hash)
                .or_default()
                .entry(matched.tx.hash)
                .or_default()
                .extend(decoded.transfers);
        }
        result
    }
}
