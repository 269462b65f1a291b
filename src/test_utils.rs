//! Shared fakes for unit tests: a programmable block source, a scripted
//! ledger, a Neo node and a transfer sender that record what they were asked.

use crate::address::{test_key, InteropAddress};
use crate::chain::neo::{
    ApplicationLogEntry, NeoBlock, NeoNode, NeoTransferSender, OutboundTransfer, UInt160, UInt256,
};
use crate::crawler::{BlockSource, QuickSyncIndex};
use crate::error::FetchError;
use crate::swap::{Ledger, PlatformInfo, SettleRequest, TokenInfo};
use crate::types::{DecodedBlock, InteropBlock, InteropTransaction, InteropTransfer};
use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_CHAIN: &str = "main";

// ── Records ──

pub fn transfer(platform: &str, seed: u8, symbol: &str, amount: u64) -> InteropTransfer {
    InteropTransfer {
        source_platform: platform.to_string(),
        source_address: format!("sender-{}", seed),
        destination_platform: platform.to_string(),
        destination_address: "bridge".to_string(),
        interop_address: interop_address(seed),
        symbol: symbol.to_string(),
        amount: U256::from(amount),
    }
}

pub fn interop_address(seed: u8) -> InteropAddress {
    InteropAddress::from_public_key(&test_key(seed)).unwrap()
}

/// Deterministic tx hash for a height
pub fn tx_hash(height: u64, index: u8) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_be_bytes());
    bytes[31] = index.wrapping_add(1);
    B256::from(bytes)
}

pub fn block_hash(height: u64) -> B256 {
    let mut bytes = [0xbb; 32];
    bytes[24..].copy_from_slice(&height.to_be_bytes());
    B256::from(bytes)
}

/// Block at `height` carrying one single-transfer swap
pub fn swap_block(platform: &str, height: u64) -> DecodedBlock {
    block_with_transfers(platform, height, vec![vec![transfer(platform, height as u8, "SOUL", 100)]])
}

/// Block at `height` with one tx per entry, each carrying the given transfers
pub fn block_with_transfers(
    platform: &str,
    height: u64,
    txs: Vec<Vec<InteropTransfer>>,
) -> DecodedBlock {
    let transactions: Vec<InteropTransaction> = txs
        .into_iter()
        .enumerate()
        .map(|(i, transfers)| InteropTransaction {
            hash: Some(tx_hash(height, i as u8)),
            transfers,
        })
        .collect();
    DecodedBlock {
        block: InteropBlock {
            platform: platform.to_string(),
            chain: TEST_CHAIN.to_string(),
            height,
            hash: Some(block_hash(height)),
            transaction_hashes: transactions.iter().filter_map(|tx| tx.hash).collect(),
        },
        transactions,
    }
}

// ── Block source ──

pub struct FakeSource {
    platform: String,
    height: AtomicU64,
    blocks: DashMap<u64, DecodedBlock>,
    failures: DashMap<u64, VecDeque<FetchError>>,
    delays: DashMap<u64, Duration>,
    fetches: DashMap<u64, usize>,
    in_flight: DashMap<u64, ()>,
    current_in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    duplicate_in_flight: AtomicBool,
}

impl FakeSource {
    pub fn new(platform: &str, height: u64) -> Self {
        Self {
            platform: platform.to_string(),
            height: AtomicU64::new(height),
            blocks: DashMap::new(),
            failures: DashMap::new(),
            delays: DashMap::new(),
            fetches: DashMap::new(),
            in_flight: DashMap::new(),
            current_in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            duplicate_in_flight: AtomicBool::new(false),
        }
    }

    pub fn insert_block(&self, block: DecodedBlock) {
        self.blocks.insert(block.height(), block);
    }

    pub fn fail_times(&self, height: u64, error: FetchError, times: usize) {
        let mut queue = self.failures.entry(height).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    pub fn delay(&self, height: u64, delay: Duration) {
        self.delays.insert(height, delay);
    }

    pub fn fetch_count(&self, height: u64) -> usize {
        self.fetches.get(&height).map(|c| *c).unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.iter().map(|c| *c.value()).sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn saw_duplicate_in_flight(&self) -> bool {
        self.duplicate_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockSource for FakeSource {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn chain(&self) -> &str {
        TEST_CHAIN
    }

    async fn current_height(&self) -> Result<u64, FetchError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn fetch_block(&self, height: u64) -> Result<DecodedBlock, FetchError> {
        *self.fetches.entry(height).or_insert(0) += 1;
        if self.in_flight.insert(height, ()).is_some() {
            self.duplicate_in_flight.store(true, Ordering::SeqCst);
        }
        let now = self.current_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&height).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .get_mut(&height)
            .and_then(|mut queue| queue.pop_front());

        self.in_flight.remove(&height);
        self.current_in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self
            .blocks
            .get(&height)
            .map(|b| b.clone())
            .unwrap_or_else(|| DecodedBlock {
                block: InteropBlock::empty(&self.platform, TEST_CHAIN, height),
                transactions: Vec::new(),
            }))
    }
}

pub struct FakeQuickSyncIndex {
    pub entries: BTreeMap<B256, u64>,
    pub fail: bool,
}

#[async_trait]
impl QuickSyncIndex for FakeQuickSyncIndex {
    async fn swap_blocks(
        &self,
        _contract: &str,
        _address: &str,
        from_height: u64,
    ) -> Result<BTreeMap<B256, u64>, FetchError> {
        if self.fail {
            return Err(FetchError::Rpc("index offline".to_string()));
        }
        Ok(self
            .entries
            .iter()
            .filter(|(_, h)| **h >= from_height)
            .map(|(k, v)| (*k, *v))
            .collect())
    }
}

// ── Ledger ──

#[derive(Default)]
pub struct FakeLedger {
    pub platforms: Vec<PlatformInfo>,
    pub tokens: HashMap<String, TokenInfo>,
    pub settlements: DashMap<(String, B256), B256>,
    pub oracle: DashMap<B256, InteropTransaction>,
    pub settle_requests: Mutex<Vec<SettleRequest>>,
    pub settlement_reads: AtomicUsize,
    /// Upcoming settle submissions that fail
    pub failing_settles: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, name: &str, address: &str) -> Self {
        self.platforms.push(PlatformInfo {
            name: name.to_string(),
            interop_addresses: vec![address.to_string()],
        });
        self
    }

    pub fn with_token(mut self, symbol: &str, decimals: u8) -> Self {
        self.tokens.insert(
            symbol.to_string(),
            TokenInfo {
                symbol: symbol.to_string(),
                decimals,
            },
        );
        self
    }

    pub fn settle_requests(&self) -> Vec<SettleRequest> {
        self.settle_requests.lock().unwrap().clone()
    }
}

/// Hash the fake ledger assigns to a settle transaction
pub fn settle_tx_hash(source_hash: &B256) -> B256 {
    let mut bytes = source_hash.0;
    bytes[0] ^= 0xff;
    B256::from(bytes)
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn platforms(&self) -> Result<Vec<PlatformInfo>, FetchError> {
        Ok(self.platforms.clone())
    }

    async fn token_info(&self, symbol: &str) -> Result<Option<TokenInfo>, FetchError> {
        Ok(self.tokens.get(symbol).cloned())
    }

    async fn settlement(&self, platform: &str, hash: &B256) -> Result<Option<B256>, FetchError> {
        self.settlement_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .settlements
            .get(&(platform.to_string(), *hash))
            .map(|h| *h))
    }

    async fn read_oracle_transaction(
        &self,
        _platform: &str,
        _chain: &str,
        hash: &B256,
    ) -> Result<Option<InteropTransaction>, FetchError> {
        Ok(self.oracle.get(hash).map(|tx| tx.clone()))
    }

    async fn settle_transaction(&self, request: SettleRequest) -> Result<Option<B256>, FetchError> {
        let failing = self
            .failing_settles
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(FetchError::Rpc("ledger unavailable".into()));
        }
        let hash = settle_tx_hash(&request.hash);
        self.settle_requests.lock().unwrap().push(request);
        Ok(Some(hash))
    }
}

// ── Neo ──

#[derive(Default)]
pub struct FakeNeoNode {
    pub blocks: DashMap<u64, NeoBlock>,
    pub logs: DashMap<UInt256, Vec<ApplicationLogEntry>>,
    pub block_count: AtomicU64,
    pub log_requests: AtomicUsize,
}

#[async_trait]
impl NeoNode for FakeNeoNode {
    async fn block_count(&self) -> Result<u64, FetchError> {
        Ok(self.block_count.load(Ordering::SeqCst))
    }

    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, FetchError> {
        Ok(self.blocks.get(&height).map(|b| b.clone()))
    }

    async fn application_log(
        &self,
        hash: &UInt256,
    ) -> Result<Vec<ApplicationLogEntry>, FetchError> {
        self.log_requests.fetch_add(1, Ordering::SeqCst);
        self.logs
            .get(hash)
            .map(|l| l.clone())
            .ok_or_else(|| FetchError::Rpc(format!("unknown transaction {}", hash)))
    }
}

#[derive(Default)]
pub struct FakeNeoSender {
    pub sent: Mutex<Vec<OutboundTransfer>>,
}

#[async_trait]
impl NeoTransferSender for FakeNeoSender {
    async fn send(&self, transfer: OutboundTransfer) -> Result<Option<B256>, FetchError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(transfer);
        Ok(Some(B256::repeat_byte(sent.len() as u8)))
    }
}

pub fn script_hash(seed: u8) -> UInt160 {
    UInt160([seed; 20])
}
