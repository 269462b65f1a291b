//! Neo adapter: wire types, script template matching, transaction decoding,
//! JSON-RPC node access and the crawler-facing block source.

pub mod decoder;
pub mod node;
pub mod rpc;
pub mod script;
pub mod source;
pub mod types;

pub use decoder::{decode_transaction, make_interop_block, NeoDecodeContext, NEO_CHAIN};
pub use node::{NeoNode, NeoTransferSender, OutboundKind, OutboundTransfer};
pub use rpc::NeoRpcClient;
pub use script::TransferTemplate;
pub use source::{NeoBlockSource, NeoWatcherBuilder};
pub use types::{
    ApplicationLogEntry, NeoBlock, NeoTransaction, NeoTxKind, TxAttribute, TxOutput, UInt160,
    UInt256, Witness,
};
