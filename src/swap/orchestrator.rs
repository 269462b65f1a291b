//! Swap Orchestrator
//!
//! Purpose:
//!     Owns every pending swap the watchers report and drives settlement of
//!     the matching credit on the other side, at most once per source hash.
//!
//! Lifecycle of a swap:
//!     Detected           merged from a watcher, indexed by both addresses
//!     PendingSettlement  external funds moved, settle queued for 30s
//!     Settled            settle submitted to the home ledger, hash cached
//!
//! Concurrency:
//!     - Swap map, address index and settlement cache are DashMaps
//!     - Settle queue is a plain mutex, never held across an await
//!     - `settle` and the debounce flush serialize on one async lock so a
//!       source hash cannot be submitted twice

use super::clock::{Clock, SystemClock};
use super::ledger::{Ledger, SettleRequest};
use super::settlement::SettlementStrategy;
use super::watcher::{SwapWatcher, WatcherBuilder};
use crate::config::SwapperConfig;
use crate::error::{ConfigError, SettlementRejected, SwapError, SwapResult};
use crate::types::{ChainSwap, PendingSettle, PendingSwap};
use alloy::primitives::{B256, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{debug, error, info, warn};

pub struct SwapOrchestrator {
    home_platform: String,
    home_chain: String,
    minimum_fee: U256,
    debounce: Duration,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    builders: Vec<Arc<dyn WatcherBuilder>>,
    strategies: HashMap<String, Arc<dyn SettlementStrategy>>,
    watchers: OnceCell<Vec<Arc<dyn SwapWatcher>>>,
    pending_swaps: DashMap<B256, PendingSwap>,
    /// Address -> swap hashes touching it, in detection order
    swap_addresses: DashMap<String, Vec<B256>>,
    /// Source hash -> settle hash
    settlements: DashMap<B256, B256>,
    pending_settles: Mutex<Vec<PendingSettle>>,
    settle_guard: AsyncMutex<()>,
}

impl SwapOrchestrator {
    pub fn new(config: &SwapperConfig, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            home_platform: config.general.home_platform.clone(),
            home_chain: config.general.home_chain.clone(),
            minimum_fee: config.minimum_fee(),
            debounce: config.settle_debounce(),
            ledger,
            clock: Arc::new(SystemClock),
            builders: Vec::new(),
            strategies: HashMap::new(),
            watchers: OnceCell::new(),
            pending_swaps: DashMap::new(),
            swap_addresses: DashMap::new(),
            settlements: DashMap::new(),
            pending_settles: Mutex::new(Vec::new()),
            settle_guard: AsyncMutex::new(()),
        }
    }

    /// Watch a platform once the ledger lists it
    pub fn with_watcher(mut self, builder: Arc<dyn WatcherBuilder>) -> Self {
        self.builders.push(builder);
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SettlementStrategy>) -> Self {
        self.strategies
            .insert(strategy.platform().to_string(), strategy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ── Detection ──

    /// One orchestrator cycle: bind watchers on first use, flush due
    /// settlements, then merge every watcher's new swaps. Returns the swaps
    /// seen for the first time.
    pub async fn poll(&self) -> Vec<PendingSwap> {
        let watchers: &[Arc<dyn SwapWatcher>] =
            match self.watchers.get_or_try_init(|| self.bind_watchers()).await {
                Ok(watchers) => watchers,
                Err(err) => {
                    error!("Failed to bind chain watchers: {}", err);
                    &[]
                }
            };

        self.flush_settles().await;

        let mut merged = Vec::new();
        for watcher in watchers {
            for swap in watcher.update().await {
                if self.merge(&swap) {
                    info!(
                        "Detected {} swap: {} => {}",
                        watcher.platform(),
                        swap.source_address,
                        swap.destination_address
                    );
                    merged.push(swap);
                }
            }
        }
        merged
    }

    /// Poll every `interval` until `shutdown` resolves
    pub async fn run_until<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Swap orchestrator stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let swaps = self.poll().await;
                    debug!(
                        "Poll complete: {} new swaps, {} pending, {} settles queued",
                        swaps.len(),
                        self.pending_swaps.len(),
                        self.pending_settle_count()
                    );
                }
            }
        }
    }

    async fn bind_watchers(&self) -> SwapResult<Vec<Arc<dyn SwapWatcher>>> {
        let platforms = self.ledger.platforms().await?;
        let mut watchers = Vec::new();

        for builder in &self.builders {
            let name = builder.platform();
            let Some(platform) = platforms.iter().find(|p| p.name == name) else {
                warn!("Platform {} is not registered on the ledger, not watching it", name);
                continue;
            };
            let Some(address) = platform.local_address() else {
                error!("{}", ConfigError::MissingLocalAddress(name.to_string()));
                continue;
            };
            match builder.build(address) {
                Ok(watcher) => {
                    info!("Watching {} swaps to {}", name, address);
                    watchers.push(watcher);
                }
                Err(err) => error!("Failed to create {} watcher: {}", name, err),
            }
        }
        Ok(watchers)
    }

    /// Insert unless the hash is known; index both addresses
    fn merge(&self, swap: &PendingSwap) -> bool {
        match self.pending_swaps.entry(swap.hash) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.map_swap(&swap.source_address, swap.hash);
                self.map_swap(&swap.destination_address, swap.hash);
                slot.insert(swap.clone());
                true
            }
        }
    }

    fn map_swap(&self, address: &str, hash: B256) {
        self.swap_addresses
            .entry(address.to_string())
            .or_default()
            .push(hash);
    }

    pub fn pending_swap(&self, hash: &B256) -> Option<PendingSwap> {
        self.pending_swaps.get(hash).map(|s| s.clone())
    }

    pub fn swap_count(&self) -> usize {
        self.pending_swaps.len()
    }

    pub fn watched_platforms(&self) -> Vec<String> {
        self.watchers
            .get()
            .map(|ws| ws.iter().map(|w| w.platform().to_string()).collect())
            .unwrap_or_default()
    }

    /// Ask a platform's watcher to re-decode a committed height
    pub fn resync_block(&self, platform: &str, height: u64) -> bool {
        let watcher = self
            .watchers
            .get()
            .and_then(|ws| ws.iter().find(|w| w.platform() == platform));
        match watcher {
            Some(watcher) => {
                watcher.resync_block(height);
                true
            }
            None => {
                warn!("Resync of {} block {} ignored: no watcher", platform, height);
                false
            }
        }
    }

    // ── Settlement ──

    pub fn pending_settle_count(&self) -> usize {
        self.lock_settles().len()
    }

    fn lock_settles(&self) -> std::sync::MutexGuard<'_, Vec<PendingSettle>> {
        self.pending_settles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit home-ledger settles whose debounce window has passed
    async fn flush_settles(&self) {
        let _guard = self.settle_guard.lock().await;
        let now = self.clock.now();

        let due: Vec<PendingSettle> = {
            let mut queue = self.lock_settles();
            let (due, waiting) = queue.drain(..).partition(|settle: &PendingSettle| {
                (now - settle.requested_at)
                    .to_std()
                    .map_or(false, |age| age >= self.debounce)
            });
            *queue = waiting;
            due
        };

        // unconfirmed settles stay queued and are retried on the next poll
        let mut retry = Vec::new();
        for settle in due {
            match self
                .settle_transaction(&self.home_platform, &self.home_chain, settle.destination_hash)
                .await
            {
                Ok(Some(hash)) => {
                    info!("Settled {} with home transaction {}", settle.source_hash, hash);
                    self.settlements
                        .insert(settle.source_hash, settle.destination_hash);
                }
                Ok(None) => {
                    warn!("Ledger refused settle of {}, will retry", settle.source_hash);
                    retry.push(settle);
                }
                Err(err) => {
                    warn!("Settle of {} failed, will retry: {}", settle.source_hash, err);
                    retry.push(settle);
                }
            }
        }
        if !retry.is_empty() {
            self.lock_settles().extend(retry);
        }
    }

    async fn settle_transaction(
        &self,
        source_platform: &str,
        chain: &str,
        hash: B256,
    ) -> SwapResult<Option<B256>> {
        let request = SettleRequest {
            source_platform: source_platform.to_string(),
            chain: chain.to_string(),
            hash,
            minimum_fee: self.minimum_fee,
        };
        Ok(self.ledger.settle_transaction(request).await?)
    }

    /// Settle one swap.
    ///
    /// Deposits into the home platform are settled directly on the ledger.
    /// Withdrawals from the home platform move funds through the
    /// destination's strategy; `Ok(None)` when no strategy exists or the
    /// swap was refused.
    pub async fn settle(
        &self,
        source_platform: &str,
        destination_platform: &str,
        source_hash: B256,
    ) -> SwapResult<Option<B256>> {
        if destination_platform == self.home_platform {
            return self
                .settle_transaction(source_platform, source_platform, source_hash)
                .await;
        }
        if source_platform != self.home_platform {
            return Err(ConfigError::InvalidSourcePlatform {
                source_platform: source_platform.to_string(),
                home: self.home_platform.clone(),
            }
            .into());
        }

        let _guard = self.settle_guard.lock().await;

        if let Some(hash) = self.settlement_hash(source_platform, &source_hash).await? {
            debug!("Swap {} already settled as {}", source_hash, hash);
            return Ok(Some(hash));
        }

        let Some(strategy) = self.strategies.get(destination_platform) else {
            debug!("No settlement strategy for {}", destination_platform);
            return Ok(None);
        };

        match self.settle_to_external(strategy.as_ref(), source_hash).await {
            Err(SwapError::Settlement(rejected)) => {
                warn!("Swap {} to {} rejected: {}", source_hash, destination_platform, rejected);
                Ok(None)
            }
            other => other,
        }
    }

    async fn settle_to_external(
        &self,
        strategy: &dyn SettlementStrategy,
        source_hash: B256,
    ) -> SwapResult<Option<B256>> {
        let Some(swap) = self
            .ledger
            .read_oracle_transaction(&self.home_platform, &self.home_chain, &source_hash)
            .await?
        else {
            warn!("Swap {} not found by the oracle", source_hash);
            return Ok(None);
        };

        let transfer = match swap.transfers.as_slice() {
            [transfer] => transfer,
            many => {
                return Err(SettlementRejected::MultipleTransfers {
                    hash: source_hash,
                    count: many.len(),
                }
                .into())
            }
        };

        let token = self
            .ledger
            .token_info(&transfer.symbol)
            .await?
            .ok_or_else(|| SettlementRejected::UnknownToken(transfer.symbol.clone()))?;

        let destination_hash = strategy
            .move_funds(&transfer.destination_address, &token, transfer.amount)
            .await?;

        if let Some(destination_hash) = destination_hash {
            info!(
                "Swap {} moved to {} as {}, settling in {:?}",
                source_hash,
                strategy.platform(),
                destination_hash,
                self.debounce
            );
            self.lock_settles().push(PendingSettle {
                source_hash,
                destination_hash,
                requested_at: self.clock.now(),
            });
        }
        Ok(destination_hash)
    }

    /// Known settlement of a source hash: local cache, then the settle queue,
    /// then the ledger. Ledger hits are cached.
    pub async fn settlement_hash(
        &self,
        source_platform: &str,
        source_hash: &B256,
    ) -> SwapResult<Option<B256>> {
        if let Some(hash) = self.settlements.get(source_hash) {
            return Ok(Some(*hash));
        }
        let queued = self
            .lock_settles()
            .iter()
            .find(|s| s.source_hash == *source_hash)
            .map(|s| s.destination_hash);
        if queued.is_some() {
            return Ok(queued);
        }

        let hash = self.ledger.settlement(source_platform, source_hash).await?;
        if let Some(hash) = hash {
            self.settlements.entry(*source_hash).or_insert(hash);
        }
        Ok(hash)
    }

    /// Swaps touching `address`, one per source hash, with settlement hashes
    /// resolved where known
    pub async fn pending_swaps_for(&self, address: &str) -> SwapResult<Vec<ChainSwap>> {
        let hashes = match self.swap_addresses.get(address) {
            Some(hashes) => hashes.clone(),
            None => return Ok(Vec::new()),
        };

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for hash in hashes {
            if !seen.insert(hash) {
                continue;
            }
            let Some(swap) = self.pending_swap(&hash) else {
                continue;
            };
            let destination_hash = self.settlement_hash(&swap.platform, &hash).await?;
            result.push(ChainSwap {
                source_platform: swap.platform.clone(),
                source_chain: swap.platform,
                source_hash: hash,
                destination_platform: self.home_platform.clone(),
                destination_chain: self.home_chain.clone(),
                destination_hash,
            });
        }
        Ok(result)
    }
}
