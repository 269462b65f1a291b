//! Block source capabilities
//!
//! A `BlockSource` fetches and decodes exactly one external height. Chain
//! adapters (Neo, Ethereum) implement it; the crawler owns everything else.

use crate::error::FetchError;
use crate::types::DecodedBlock;
use alloy::primitives::B256;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait BlockSource: Send + Sync + 'static {
    fn platform(&self) -> &str;

    fn chain(&self) -> &str;

    /// Count of fetchable heights: every height strictly below this value
    /// can be fetched.
    async fn current_height(&self) -> Result<u64, FetchError>;

    /// Fetch and decode one height. Irrelevant blocks come back as the
    /// sentinel block, never as an error.
    async fn fetch_block(&self, height: u64) -> Result<DecodedBlock, FetchError>;
}

/// External relevance index used once per crawler for quick sync
#[async_trait]
pub trait QuickSyncIndex: Send + Sync {
    /// Transaction (or block) hash -> height for every swap touching
    /// `address` through `contract`, starting at `from_height`.
    async fn swap_blocks(
        &self,
        contract: &str,
        address: &str,
        from_height: u64,
    ) -> Result<BTreeMap<B256, u64>, FetchError>;
}
