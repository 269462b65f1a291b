//! Ethereum node capability

use super::types::EthBlock;
use crate::error::FetchError;
use async_trait::async_trait;

#[async_trait]
pub trait EthChain: Send + Sync {
    /// Latest block number known to the node
    async fn block_number(&self) -> Result<u64, FetchError>;

    /// Full block with transactions and their ERC20 `Transfer` logs.
    /// `None` when the node does not have it yet.
    async fn block(&self, number: u64) -> Result<Option<EthBlock>, FetchError>;
}
