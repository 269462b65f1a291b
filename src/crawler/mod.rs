//! Block crawling: frontier tracking, batched concurrent fetch and
//! indefinite per-height retry.

pub mod block_crawler;
pub mod retry;
pub mod source;

pub use block_crawler::{BlockCrawler, CrawlerSettings, QuickSync};
pub use retry::{fetch_with_retry, Backoff, RetryPolicy};
pub use source::{BlockSource, QuickSyncIndex};
