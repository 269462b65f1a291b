//! Neo node and wallet capabilities
//!
//! The decoder, block source and settlement strategy only talk to Neo
//! through these traits. `NeoRpcClient` implements `NeoNode`; signing and
//! broadcasting outbound transfers belongs to the wallet.

use super::types::{ApplicationLogEntry, NeoBlock, UInt160, UInt256};
use crate::error::FetchError;
use alloy::primitives::B256;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait NeoNode: Send + Sync {
    /// Number of blocks; the newest height is `block_count - 1`
    async fn block_count(&self) -> Result<u64, FetchError>;

    /// `None` when the node does not have the height yet
    async fn block(&self, height: u64) -> Result<Option<NeoBlock>, FetchError>;

    /// `transfer` notifications emitted by the transaction
    async fn application_log(&self, hash: &UInt256)
        -> Result<Vec<ApplicationLogEntry>, FetchError>;
}

/// How an outbound payment is built on Neo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    /// Global UTXO asset (NEO, GAS)
    Asset,
    /// NEP5 contract `transfer`
    Nep5,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTransfer {
    pub kind: OutboundKind,
    pub destination: UInt160,
    pub symbol: String,
    /// Whole-unit amount
    pub total: Decimal,
}

#[async_trait]
pub trait NeoTransferSender: Send + Sync {
    /// Sign and broadcast; returns the Neo transaction hash
    async fn send(&self, transfer: OutboundTransfer) -> Result<Option<B256>, FetchError>;
}
