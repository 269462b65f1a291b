//! Swap orchestration: watchers, home ledger access, settlement strategies
//! and the orchestrator that ties them together.

pub mod clock;
pub mod ledger;
pub mod orchestrator;
pub mod settlement;
pub mod watcher;

pub use clock::{Clock, SystemClock};
pub use ledger::{Ledger, PlatformInfo, SettleRequest, TokenInfo};
pub use orchestrator::SwapOrchestrator;
pub use settlement::{NeoSettlement, SettlementStrategy};
pub use watcher::{ChainWatcher, SwapWatcher, WatcherBuilder};
