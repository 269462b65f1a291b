//! Bridge Swapper Library
//!
//! Detection-and-settlement core of a cross-chain bridge. Chain adapters
//! decode deposits to the bridge on Neo and Ethereum, block crawlers keep
//! each platform's frontier in step with its chain, and the swap
//! orchestrator deduplicates the resulting swaps and settles them on the
//! home ledger.

pub mod address;
pub mod chain;
pub mod config;
pub mod crawler;
pub mod error;
pub mod registry;
pub mod store;
pub mod swap;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use address::InteropAddress;
pub use config::SwapperConfig;
pub use crawler::{BlockCrawler, BlockSource, CrawlerSettings, RetryPolicy};
pub use error::{ConfigError, DecodeReject, FetchError, SettlementRejected, SwapError, SwapResult};
pub use registry::AssetRegistry;
pub use store::{InteropStore, MemoryStore};
pub use swap::{Ledger, SwapOrchestrator, SwapWatcher, WatcherBuilder};
pub use types::{ChainSwap, InteropBlock, InteropTransaction, InteropTransfer, PendingSwap};
