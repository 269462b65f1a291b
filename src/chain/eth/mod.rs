//! Ethereum adapter: matched-transaction buffer, transfer decoding, alloy
//! node access and the crawler-facing block source.

pub mod crawler;
pub mod decoder;
pub mod node;
pub mod provider;
pub mod source;
pub mod types;

pub use crawler::{EthBlockCrawler, InteropTransfers};
pub use decoder::{decode_transaction, EthDecodeContext};
pub use node::EthChain;
pub use provider::AlloyEthChain;
pub use source::{EthBlockSource, EthWatcherBuilder};
pub use types::{EthBlock, EthTransaction, TransferLog, ETH_CHAIN};
