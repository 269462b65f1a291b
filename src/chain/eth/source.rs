//! Ethereum block source and watcher wiring
//!
//! A height is fetchable once it is `confirmations` blocks deep. Node reads
//! run concurrently; matching and extraction share one buffer and run one
//! block at a time.

use super::crawler::EthBlockCrawler;
use super::decoder::EthDecodeContext;
use super::node::EthChain;
use super::provider::AlloyEthChain;
use super::types::ETH_CHAIN;
use crate::config::SwapperConfig;
use crate::crawler::{BlockCrawler, BlockSource, CrawlerSettings};
use crate::error::{ConfigError, FetchError, SwapError};
use crate::registry::AssetRegistry;
use crate::store::InteropStore;
use crate::swap::{ChainWatcher, SwapWatcher, WatcherBuilder};
use crate::types::{DecodedBlock, InteropBlock, InteropTransaction, ETHEREUM_PLATFORM};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

pub struct EthBlockSource {
    chain: Arc<dyn EthChain>,
    crawler: EthBlockCrawler,
    swap_address: Address,
    registry: AssetRegistry,
    home_platform: String,
    confirmations: u64,
    buffer_guard: AsyncMutex<()>,
}

impl EthBlockSource {
    pub fn new(
        chain: Arc<dyn EthChain>,
        swap_address: Address,
        watched: Vec<Address>,
        registry: AssetRegistry,
        home_platform: &str,
        confirmations: u64,
    ) -> Self {
        let crawler = EthBlockCrawler::new(std::iter::once(swap_address).chain(watched));
        Self {
            chain,
            crawler,
            swap_address,
            registry,
            home_platform: home_platform.to_string(),
            confirmations,
            buffer_guard: AsyncMutex::new(()),
        }
    }

    /// Heights below this value are confirmed
    fn confirmed_below(&self, head: u64) -> u64 {
        (head + 1).saturating_sub(self.confirmations)
    }
}

#[async_trait]
impl BlockSource for EthBlockSource {
    fn platform(&self) -> &str {
        ETHEREUM_PLATFORM
    }

    fn chain(&self) -> &str {
        ETH_CHAIN
    }

    async fn current_height(&self) -> Result<u64, FetchError> {
        Ok(self.confirmed_below(self.chain.block_number().await?))
    }

    async fn fetch_block(&self, height: u64) -> Result<DecodedBlock, FetchError> {
        let head = self.chain.block_number().await?;
        if height >= self.confirmed_below(head) {
            return Err(FetchError::BlockNotAvailable(height));
        }
        let block = self
            .chain
            .block(height)
            .await?
            .ok_or(FetchError::BlockNotAvailable(height))?;

        let ctx = EthDecodeContext {
            swap_address: self.swap_address,
            registry: &self.registry,
            home_platform: &self.home_platform,
        };
        let mut extracted = {
            let _guard = self.buffer_guard.lock().await;
            self.crawler.process_block(&block);
            self.crawler.extract_interop_transfers(&ctx)
        };
        let mut by_tx = extracted.remove(&block.hash).unwrap_or_default();

        // block order, not hash order
        let transactions: Vec<InteropTransaction> = block
            .transactions
            .iter()
            .filter_map(|tx| {
                by_tx.remove(&tx.hash).map(|transfers| InteropTransaction {
                    hash: Some(tx.hash),
                    transfers,
                })
            })
            .collect();

        Ok(DecodedBlock {
            block: InteropBlock {
                platform: ETHEREUM_PLATFORM.to_string(),
                chain: ETH_CHAIN.to_string(),
                height,
                hash: (!transactions.is_empty()).then_some(block.hash),
                transaction_hashes: transactions.iter().filter_map(|tx| tx.hash).collect(),
            },
            transactions,
        })
    }
}

pub struct EthWatcherBuilder {
    chain: Arc<dyn EthChain>,
    store: Arc<dyn InteropStore>,
    config: SwapperConfig,
}

impl EthWatcherBuilder {
    pub fn new(config: &SwapperConfig, chain: Arc<dyn EthChain>, store: Arc<dyn InteropStore>) -> Self {
        Self {
            chain,
            store,
            config: config.clone(),
        }
    }

    pub fn from_rpc(config: &SwapperConfig, store: Arc<dyn InteropStore>) -> Result<Self, SwapError> {
        let url = config
            .ethereum
            .rpc_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("[ethereum] rpc_url is not set".to_string()))?;
        let chain = Arc::new(AlloyEthChain::connect_http(url)?);
        Ok(Self::new(config, chain, store))
    }
}

impl WatcherBuilder for EthWatcherBuilder {
    fn platform(&self) -> &str {
        ETHEREUM_PLATFORM
    }

    fn build(&self, local_address: &str) -> Result<Arc<dyn SwapWatcher>, SwapError> {
        let invalid = |address: &str| ConfigError::InvalidLocalAddress {
            platform: ETHEREUM_PLATFORM.to_string(),
            address: address.to_string(),
        };
        let swap_address: Address = local_address.parse().map_err(|_| invalid(local_address))?;
        let watched = self
            .config
            .ethereum
            .watched_addresses
            .iter()
            .map(|a| a.parse::<Address>().map_err(|_| invalid(a)))
            .collect::<Result<Vec<_>, _>>()?;

        let source = EthBlockSource::new(
            Arc::clone(&self.chain),
            swap_address,
            watched,
            self.config.ethereum_registry(),
            &self.config.general.home_platform,
            self.config.ethereum.confirmations,
        );
        let settings = CrawlerSettings::new(self.config.ethereum.start_height)
            .with_batch_cap(self.config.general.batch_cap)
            .with_retry(self.config.retry_policy());
        let crawler = BlockCrawler::new(Arc::new(source), Arc::clone(&self.store), settings);

        info!(
            "Ethereum watcher bound to {} ({} confirmations)",
            local_address, self.config.ethereum.confirmations
        );
        Ok(Arc::new(ChainWatcher::new(local_address, crawler)))
    }
}
