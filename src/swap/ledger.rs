//! Home ledger capability
//!
//! Everything the orchestrator needs from the home chain: the platform and
//! token registries, the authoritative settlement record, the oracle view of
//! home-chain deposits, and submission of settle transactions.

use crate::error::FetchError;
use crate::types::InteropTransaction;
use alloy::primitives::{B256, U256};
use async_trait::async_trait;

/// External platform as registered on the home ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    /// Bridge-controlled addresses on that platform; the first one is watched
    pub interop_addresses: Vec<String>,
}

impl PlatformInfo {
    pub fn local_address(&self) -> Option<&str> {
        self.interop_addresses.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
}

/// Settle transaction for one external deposit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleRequest {
    pub source_platform: String,
    pub chain: String,
    pub hash: B256,
    /// Fee the swapper pays on the home ledger
    pub minimum_fee: U256,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn platforms(&self) -> Result<Vec<PlatformInfo>, FetchError>;

    async fn token_info(&self, symbol: &str) -> Result<Option<TokenInfo>, FetchError>;

    /// Hash of the settle transaction for `hash`, once the ledger has one
    async fn settlement(&self, platform: &str, hash: &B256) -> Result<Option<B256>, FetchError>;

    async fn read_oracle_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &B256,
    ) -> Result<Option<InteropTransaction>, FetchError>;

    /// Sign and submit; `None` when the ledger refused the transaction
    async fn settle_transaction(&self, request: SettleRequest) -> Result<Option<B256>, FetchError>;
}
