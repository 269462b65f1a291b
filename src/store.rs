//! Interop Store
//!
//! Purpose:
//!     Persistence seam for the crawler: the per-platform frontier height
//!     (always a decimal string) and the decoded blocks/transactions it has
//!     committed, so they can be replayed after a restart.
//!
//! Design:
//!     - `InteropStore` is the only thing the crawler knows about storage
//!     - `MemoryStore` is a DashMap-backed implementation used by tests and
//!       single-process deployments

use crate::error::FetchError;
use crate::types::{InteropBlock, InteropTransaction};
use alloy::primitives::B256;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait InteropStore: Send + Sync {
    /// Stored frontier, `None` when the platform was never synced
    async fn current_height(&self, platform: &str, chain: &str)
        -> Result<Option<String>, FetchError>;

    async fn set_current_height(
        &self,
        platform: &str,
        chain: &str,
        height: &str,
    ) -> Result<(), FetchError>;

    /// Persist a committed block together with its relevant transactions
    async fn record_block(
        &self,
        block: &InteropBlock,
        transactions: &[InteropTransaction],
    ) -> Result<(), FetchError>;

    /// Every recorded block for the platform, ascending by height
    async fn read_all_blocks(
        &self,
        platform: &str,
        chain: &str,
    ) -> Result<Vec<InteropBlock>, FetchError>;

    async fn read_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &B256,
    ) -> Result<Option<InteropTransaction>, FetchError>;
}

type ChainKey = (String, String);

fn chain_key(platform: &str, chain: &str) -> ChainKey {
    (platform.to_string(), chain.to_string())
}

/// In-memory store. Clones share the same maps.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    heights: Arc<DashMap<ChainKey, String>>,
    blocks: Arc<DashMap<ChainKey, BTreeMap<u64, InteropBlock>>>,
    transactions: Arc<DashMap<(ChainKey, B256), InteropTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self, platform: &str, chain: &str) -> usize {
        self.blocks
            .get(&chain_key(platform, chain))
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl InteropStore for MemoryStore {
    async fn current_height(
        &self,
        platform: &str,
        chain: &str,
    ) -> Result<Option<String>, FetchError> {
        Ok(self
            .heights
            .get(&chain_key(platform, chain))
            .map(|entry| entry.value().clone()))
    }

    async fn set_current_height(
        &self,
        platform: &str,
        chain: &str,
        height: &str,
    ) -> Result<(), FetchError> {
        debug!("Store: {}/{} height -> {}", platform, chain, height);
        self.heights
            .insert(chain_key(platform, chain), height.to_string());
        Ok(())
    }

    async fn record_block(
        &self,
        block: &InteropBlock,
        transactions: &[InteropTransaction],
    ) -> Result<(), FetchError> {
        let key = chain_key(&block.platform, &block.chain);
        for tx in transactions {
            if let Some(hash) = tx.hash {
                self.transactions.insert((key.clone(), hash), tx.clone());
            }
        }
        self.blocks
            .entry(key)
            .or_default()
            .insert(block.height, block.clone());
        Ok(())
    }

    async fn read_all_blocks(
        &self,
        platform: &str,
        chain: &str,
    ) -> Result<Vec<InteropBlock>, FetchError> {
        Ok(self
            .blocks
            .get(&chain_key(platform, chain))
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &B256,
    ) -> Result<Option<InteropTransaction>, FetchError> {
        Ok(self
            .transactions
            .get(&(chain_key(platform, chain), *hash))
            .map(|entry| entry.value().clone()))
    }
}
