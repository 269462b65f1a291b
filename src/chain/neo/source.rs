//! Neo block source and watcher wiring

use super::decoder::{make_interop_block, NeoDecodeContext, NEO_CHAIN};
use super::node::NeoNode;
use super::rpc::NeoRpcClient;
use super::types::UInt160;
use crate::config::SwapperConfig;
use crate::crawler::{BlockCrawler, BlockSource, CrawlerSettings, QuickSync, QuickSyncIndex};
use crate::error::{ConfigError, FetchError, SwapError};
use crate::registry::AssetRegistry;
use crate::store::InteropStore;
use crate::swap::{ChainWatcher, SwapWatcher, WatcherBuilder};
use crate::types::{DecodedBlock, NEO_PLATFORM};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct NeoBlockSource {
    node: Arc<dyn NeoNode>,
    receive_address: UInt160,
    registry: AssetRegistry,
    home_platform: String,
}

impl NeoBlockSource {
    pub fn new(
        node: Arc<dyn NeoNode>,
        receive_address: UInt160,
        registry: AssetRegistry,
        home_platform: &str,
    ) -> Self {
        Self {
            node,
            receive_address,
            registry,
            home_platform: home_platform.to_string(),
        }
    }

    pub fn receive_address(&self) -> &UInt160 {
        &self.receive_address
    }
}

#[async_trait]
impl BlockSource for NeoBlockSource {
    fn platform(&self) -> &str {
        NEO_PLATFORM
    }

    fn chain(&self) -> &str {
        NEO_CHAIN
    }

    async fn current_height(&self) -> Result<u64, FetchError> {
        self.node.block_count().await
    }

    async fn fetch_block(&self, height: u64) -> Result<DecodedBlock, FetchError> {
        let block = self
            .node
            .block(height)
            .await?
            .ok_or(FetchError::BlockNotAvailable(height))?;

        let ctx = NeoDecodeContext {
            receive_address: self.receive_address,
            registry: &self.registry,
            home_platform: &self.home_platform,
        };
        Ok(make_interop_block(&block, &ctx, self.node.as_ref()).await)
    }
}

/// Builds the Neo watcher once the ledger tells us the bridge's Neo address
pub struct NeoWatcherBuilder {
    node: Arc<dyn NeoNode>,
    store: Arc<dyn InteropStore>,
    quick_sync_index: Option<Arc<dyn QuickSyncIndex>>,
    registry: AssetRegistry,
    config: SwapperConfig,
}

impl NeoWatcherBuilder {
    pub fn new(
        config: &SwapperConfig,
        node: Arc<dyn NeoNode>,
        store: Arc<dyn InteropStore>,
        quick_sync_index: Option<Arc<dyn QuickSyncIndex>>,
    ) -> Self {
        Self {
            node,
            store,
            quick_sync_index,
            registry: AssetRegistry::neo(),
            config: config.clone(),
        }
    }

    /// Node and quick-sync index both served by `[neo] rpc_url`
    pub fn from_rpc(config: &SwapperConfig, store: Arc<dyn InteropStore>) -> Result<Self, SwapError> {
        let url = config
            .neo
            .rpc_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("[neo] rpc_url is not set".to_string()))?;
        let client = Arc::new(NeoRpcClient::new(url)?);
        let index: Arc<dyn QuickSyncIndex> = client.clone();
        Ok(Self::new(config, client, store, Some(index)))
    }

    fn crawler_settings(&self, local_address: &str) -> CrawlerSettings {
        let mut settings = CrawlerSettings::new(self.config.neo.start_height)
            .with_batch_cap(self.config.general.batch_cap)
            .with_retry(self.config.retry_policy());

        if self.config.neo.quick_sync {
            match &self.quick_sync_index {
                Some(index) => {
                    settings = settings.with_quick_sync(QuickSync {
                        index: Arc::clone(index),
                        contract: self.config.neo.quick_sync_contract.clone(),
                        address: local_address.to_string(),
                    })
                }
                None => info!("Neo quick sync requested but no index is available"),
            }
        }
        settings
    }
}

impl WatcherBuilder for NeoWatcherBuilder {
    fn platform(&self) -> &str {
        NEO_PLATFORM
    }

    fn build(&self, local_address: &str) -> Result<Arc<dyn SwapWatcher>, SwapError> {
        let receive_address =
            UInt160::from_address(local_address).ok_or_else(|| ConfigError::InvalidLocalAddress {
                platform: NEO_PLATFORM.to_string(),
                address: local_address.to_string(),
            })?;

        let source = NeoBlockSource::new(
            Arc::clone(&self.node),
            receive_address,
            self.registry.clone(),
            &self.config.general.home_platform,
        );
        let crawler = BlockCrawler::new(
            Arc::new(source),
            Arc::clone(&self.store),
            self.crawler_settings(local_address),
        );
        info!(
            "Neo watcher bound to {} (start height {}, quick sync {})",
            local_address, self.config.neo.start_height, self.config.neo.quick_sync
        );
        Ok(Arc::new(ChainWatcher::new(local_address, crawler)))
    }
}
