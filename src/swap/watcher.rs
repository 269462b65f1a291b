//! Chain Watcher
//!
//! Binds one block crawler to the orchestrator polling contract. Builders
//! create watchers lazily, once the ledger has told us the bridge address on
//! their platform.

use crate::crawler::{BlockCrawler, BlockSource};
use crate::error::SwapError;
use crate::types::PendingSwap;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait SwapWatcher: Send + Sync {
    fn platform(&self) -> &str;

    /// Bridge receive address on the watched platform
    fn local_address(&self) -> &str;

    /// One crawl cycle. Never fails.
    async fn update(&self) -> Vec<PendingSwap>;

    fn resync_block(&self, height: u64);
}

pub trait WatcherBuilder: Send + Sync {
    fn platform(&self) -> &str;

    fn build(&self, local_address: &str) -> Result<Arc<dyn SwapWatcher>, SwapError>;
}

pub struct ChainWatcher<S: BlockSource> {
    local_address: String,
    crawler: BlockCrawler<S>,
}

impl<S: BlockSource> ChainWatcher<S> {
    pub fn new(local_address: &str, crawler: BlockCrawler<S>) -> Self {
        Self {
            local_address: local_address.to_string(),
            crawler,
        }
    }

    pub fn crawler(&self) -> &BlockCrawler<S> {
        &self.crawler
    }
}

#[async_trait]
impl<S: BlockSource> SwapWatcher for ChainWatcher<S> {
    fn platform(&self) -> &str {
        self.crawler.platform()
    }

    fn local_address(&self) -> &str {
        &self.local_address
    }

    async fn update(&self) -> Vec<PendingSwap> {
        self.crawler.update().await
    }

    fn resync_block(&self, height: u64) {
        self.crawler.resync_block(height)
    }
}
