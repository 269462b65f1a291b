//! Block Crawler
//!
//! Purpose:
//!     Keeps one platform's frontier in step with the external chain head and
//!     turns every committed block into pending swap observations, in height
//!     order, without gaps or duplicates.
//!
//! Design:
//!     - Frontier = next height to fetch, persisted as a decimal string
//!     - First call per instance replays every recorded block, then runs the
//!       optional quick sync, then returns
//!     - Steady state: batch = min(head - frontier, batch_cap); one task per
//!       height, full barrier, results processed in height order
//!     - Frontier is written only after the whole batch is committed
//!     - Updates of the same platform serialize on a process-wide async lock

use super::retry::{fetch_with_retry, RetryPolicy};
use super::source::{BlockSource, QuickSyncIndex};
use crate::config::MAX_BATCH_CAP;
use crate::error::{ConfigError, SwapError, SwapResult};
use crate::store::InteropStore;
use crate::types::{DecodedBlock, InteropBlock, PendingSwap};
use dashmap::DashMap;
use futures::future::join_all;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

/// Platform name -> exclusive region for frontier updates
static PLATFORM_LOCKS: Lazy<DashMap<String, Arc<AsyncMutex<()>>>> = Lazy::new(DashMap::new);

fn platform_lock(platform: &str) -> Arc<AsyncMutex<()>> {
    PLATFORM_LOCKS
        .entry(platform.to_string())
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

/// One-time accelerated replay through an external relevance index
pub struct QuickSync {
    pub index: Arc<dyn QuickSyncIndex>,
    pub contract: String,
    /// Bridge receive address as the index knows it
    pub address: String,
}

pub struct CrawlerSettings {
    /// Frontier seeded into an empty store
    pub start_height: u64,
    pub batch_cap: u64,
    pub retry: RetryPolicy,
    pub quick_sync: Option<QuickSync>,
}

impl CrawlerSettings {
    pub fn new(start_height: u64) -> Self {
        Self {
            start_height,
            batch_cap: MAX_BATCH_CAP,
            retry: RetryPolicy::default(),
            quick_sync: None,
        }
    }

    pub fn with_batch_cap(mut self, batch_cap: u64) -> Self {
        self.batch_cap = batch_cap.clamp(1, MAX_BATCH_CAP);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quick_sync(mut self, quick_sync: QuickSync) -> Self {
        self.quick_sync = Some(quick_sync);
        self
    }
}

pub struct BlockCrawler<S: BlockSource> {
    source: Arc<S>,
    store: Arc<dyn InteropStore>,
    settings: CrawlerSettings,
    /// Cleared only after a successful replay
    initial_replay: AtomicBool,
    resync: Mutex<Vec<u64>>,
}

impl<S: BlockSource> BlockCrawler<S> {
    pub fn new(source: Arc<S>, store: Arc<dyn InteropStore>, settings: CrawlerSettings) -> Self {
        Self {
            source,
            store,
            settings,
            initial_replay: AtomicBool::new(true),
            resync: Mutex::new(Vec::new()),
        }
    }

    pub fn platform(&self) -> &str {
        self.source.platform()
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Queue a committed height for re-decoding on the next update
    pub fn resync_block(&self, height: u64) {
        self.resync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(height);
    }

    /// Current frontier, seeding it from the start height if absent
    pub async fn frontier(&self) -> SwapResult<u64> {
        let (platform, chain) = (self.source.platform(), self.source.chain());
        match self.store.current_height(platform, chain).await? {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(height) => Ok(height),
                Err(_) => Err(SwapError::from(ConfigError::InvalidHeight {
                    platform: platform.to_string(),
                    chain: chain.to_string(),
                    value,
                })),
            },
            None => {
                let start = self.settings.start_height;
                self.store
                    .set_current_height(platform, chain, &start.to_string())
                    .await?;
                info!("{}: no stored height, starting at {}", platform, start);
                Ok(start)
            }
        }
    }

    /// One crawl cycle. Never fails: errors are logged and whatever was
    /// observed before the failure is returned.
    pub async fn update(&self) -> Vec<PendingSwap> {
        let lock = platform_lock(self.source.platform());
        let _guard = lock.lock().await;

        let mut swaps = Vec::new();
        if let Err(err) = self.sync(&mut swaps).await {
            error!(
                "{}: block sync failed: {} ({} swaps observed before failure)",
                self.source.platform(),
                err,
                swaps.len()
            );
        }
        swaps
    }

    async fn sync(&self, swaps: &mut Vec<PendingSwap>) -> SwapResult<()> {
        let platform = self.source.platform();
        let chain = self.source.chain();
        let mut frontier = self.frontier().await?;

        if self.initial_replay.load(Ordering::Acquire) {
            self.replay(frontier, swaps).await?;
            self.initial_replay.store(false, Ordering::Release);
            return Ok(());
        }

        let current = self.source.current_height().await?;
        self.process_resync(frontier, swaps).await?;

        while current > frontier {
            let batch = (current - frontier).min(self.settings.batch_cap.max(1));
            debug!(
                "{}: chain height {}, frontier {}, delta {}, batch {}",
                platform,
                current,
                frontier,
                current - frontier,
                batch
            );

            let blocks = self.fetch_batch(frontier, batch).await?;
            for block in &blocks {
                self.commit(block, swaps).await?;
            }

            frontier += batch;
            self.store
                .set_current_height(platform, chain, &frontier.to_string())
                .await?;
        }
        Ok(())
    }

    /// Fetch `batch` consecutive heights starting at `from`, in height order
    async fn fetch_batch(&self, from: u64, batch: u64) -> SwapResult<Vec<DecodedBlock>> {
        let policy = self.settings.retry;
        if batch == 1 {
            return Ok(vec![fetch_with_retry(self.source.as_ref(), from, policy).await]);
        }

        let tasks: Vec<_> = (from..from + batch)
            .map(|height| {
                let source = Arc::clone(&self.source);
                tokio::spawn(async move { fetch_with_retry(source.as_ref(), height, policy).await })
            })
            .collect();

        let mut blocks = Vec::with_capacity(batch as usize);
        for (height, joined) in (from..).zip(join_all(tasks).await) {
            let block =
                joined.map_err(|e| SwapError::Task(format!("block {}: {}", height, e)))?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    async fn commit(&self, block: &DecodedBlock, swaps: &mut Vec<PendingSwap>) -> SwapResult<()> {
        self.store
            .record_block(&block.block, &block.transactions)
            .await?;
        self.process_block(&block.block, Some(block), swaps).await
    }

    /// Turn a committed block into swaps. Transactions missing from `decoded`
    /// are read back from the store.
    async fn process_block(
        &self,
        block: &InteropBlock,
        decoded: Option<&DecodedBlock>,
        swaps: &mut Vec<PendingSwap>,
    ) -> SwapResult<()> {
        for hash in &block.transaction_hashes {
            let stored;
            let tx = match decoded.and_then(|d| d.transaction(hash)) {
                Some(tx) => tx,
                None => {
                    stored = self
                        .store
                        .read_transaction(&block.platform, &block.chain, hash)
                        .await?;
                    match stored.as_ref() {
                        Some(tx) => tx,
                        None => {
                            warn!(
                                "{}: transaction {} of block {} not found, skipping",
                                block.platform, hash, block.height
                            );
                            continue;
                        }
                    }
                }
            };

            match tx.transfers.as_slice() {
                [transfer] => {
                    debug!(
                        "{}: swap {} from {} to {} ({} {})",
                        block.platform,
                        hash,
                        transfer.source_address,
                        transfer.interop_address,
                        transfer.amount,
                        transfer.symbol
                    );
                    swaps.push(PendingSwap::from_transfer(&block.platform, *hash, transfer));
                }
                [] => debug!("{}: transaction {} carries no transfers", block.platform, hash),
                many => warn!(
                    "{}: transaction {} carries {} transfers, multi-transfer swaps are not supported",
                    block.platform,
                    hash,
                    many.len()
                ),
            }
        }
        Ok(())
    }

    async fn replay(&self, frontier: u64, swaps: &mut Vec<PendingSwap>) -> SwapResult<()> {
        let platform = self.source.platform();
        let blocks = self
            .store
            .read_all_blocks(platform, self.source.chain())
            .await?;
        info!("{}: replaying {} recorded blocks", platform, blocks.len());

        for block in &blocks {
            self.process_block(block, None, swaps).await?;
        }

        if let Some(quick_sync) = &self.settings.quick_sync {
            info!("{}: quick sync from height {}", platform, frontier);
            if let Err(err) = self.quick_sync(quick_sync, frontier, swaps).await {
                warn!("{}: quick sync stopped: {}", platform, err);
            }
        }
        Ok(())
    }

    async fn quick_sync(
        &self,
        quick_sync: &QuickSync,
        frontier: u64,
        swaps: &mut Vec<PendingSwap>,
    ) -> SwapResult<()> {
        let (platform, chain) = (self.source.platform(), self.source.chain());
        let index = quick_sync
            .index
            .swap_blocks(&quick_sync.contract, &quick_sync.address, frontier)
            .await?;

        let mut heights: Vec<u64> = index.values().copied().filter(|h| *h >= frontier).collect();
        heights.sort_unstable();
        heights.dedup();
        info!("{}: quick sync found {} blocks to process", platform, heights.len());

        for height in heights {
            let block = self.source.fetch_block(height).await?;
            let indexed = block.block.hash.map_or(false, |h| index.contains_key(&h))
                || block
                    .block
                    .transaction_hashes
                    .iter()
                    .any(|h| index.contains_key(h));
            if !indexed {
                debug!("{}: quick sync block {} has no indexed swap", platform, height);
                continue;
            }

            self.commit(&block, swaps).await?;
            self.store
                .set_current_height(platform, chain, &(height + 1).to_string())
                .await?;
            debug!("{}: quick sync committed block {}", platform, height);
        }
        Ok(())
    }

    async fn process_resync(&self, frontier: u64, swaps: &mut Vec<PendingSwap>) -> SwapResult<()> {
        let platform = self.source.platform();
        loop {
            let next = {
                let mut queue = self.resync.lock().unwrap_or_else(PoisonError::into_inner);
                if queue.is_empty() {
                    break;
                }
                queue.remove(0)
            };

            if next >= frontier {
                warn!(
                    "{}: resync of block {} dropped, frontier is {} and it was never committed",
                    platform, next, frontier
                );
                continue;
            }

            info!("{}: resyncing block {}", platform, next);
            let block = fetch_with_retry(self.source.as_ref(), next, self.settings.retry).await;
            if let Err(err) = self.commit(&block, swaps).await {
                self.resync_block(next);
                return Err(err);
            }
        }
        Ok(())
    }
}
