//! Alloy-backed Ethereum node access
//!
//! Fetches full blocks and the ERC20 `Transfer` logs emitted in them, and
//! folds both into `EthBlock`. The sender public key is recovered from each
//! transaction signature so deposits without a memo still map to the
//! depositor's interop address.

use super::node::EthChain;
use super::types::{EthBlock, EthTransaction, TransferLog};
use crate::error::{ConfigError, FetchError};
use alloy::consensus::{Transaction as ConsensusTransaction, TxEnvelope};
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
}

pub struct AlloyEthChain<P> {
    provider: P,
}

impl<P> AlloyEthChain<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl AlloyEthChain<DynProvider> {
    pub fn connect_http(rpc_url: &str) -> Result<Self, ConfigError> {
        let provider = ProviderBuilder::new().connect_http(
            rpc_url
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("ethereum rpc_url {}: {}", rpc_url, e)))?,
        );
        Ok(Self::new(provider.erased()))
    }
}

fn rpc_error(err: impl std::fmt::Display) -> FetchError {
    FetchError::Rpc(err.to_string())
}

/// `None` for anything that is not a well-formed ERC20 `Transfer`
pub fn decode_transfer_log(log: &Log) -> Option<TransferLog> {
    let topics = log.topics();
    if topics.len() < 3 || topics[0] != Transfer::SIGNATURE_HASH {
        return None;
    }
    let data = &log.inner.data.data;
    if data.len() < 32 {
        return None;
    }
    Some(TransferLog {
        contract: log.address(),
        from: Address::from_word(topics[1]),
        to: Address::from_word(topics[2]),
        value: U256::from_be_slice(&data[..32]),
    })
}

/// Compressed secp256k1 key that signed the transaction
pub fn signer_public_key(envelope: &TxEnvelope) -> Option<[u8; 33]> {
    let key = envelope
        .signature()
        .recover_from_prehash(&envelope.signature_hash())
        .ok()?;
    key.to_encoded_point(true).as_bytes().try_into().ok()
}

#[async_trait]
impl<P> EthChain for AlloyEthChain<P>
where
    P: Provider + 'static,
{
    async fn block_number(&self) -> Result<u64, FetchError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn block(&self, number: u64) -> Result<Option<EthBlock>, FetchError> {
        let block = match self
            .provider
            .get_block_by_number(number.into())
            .full()
            .await
            .map_err(rpc_error)?
        {
            Some(block) => block,
            None => return Ok(None),
        };

        let filter = Filter::new()
            .from_block(number)
            .to_block(number)
            .event_signature(Transfer::SIGNATURE_HASH);
        let logs = self.provider.get_logs(&filter).await.map_err(rpc_error)?;

        let mut transfer_logs: HashMap<B256, Vec<TransferLog>> = HashMap::new();
        for log in &logs {
            if let (Some(tx_hash), Some(transfer)) = (log.transaction_hash, decode_transfer_log(log)) {
                transfer_logs.entry(tx_hash).or_default().push(transfer);
            }
        }
        debug!(
            "Ethereum block {}: {} transactions, {} Transfer logs",
            number,
            block.transactions.len(),
            logs.len()
        );

        let transactions = block
            .transactions
            .txns()
            .map(|tx| {
                let hash = TransactionResponse::tx_hash(tx);
                let sender_public_key = signer_public_key(tx.inner.inner());
                if sender_public_key.is_none() {
                    debug!("Ethereum tx {}: signer key not recoverable", hash);
                }
                EthTransaction {
                    hash,
                    from: TransactionResponse::from(tx),
                    to: ConsensusTransaction::to(tx),
                    value: ConsensusTransaction::value(tx),
                    input: ConsensusTransaction::input(tx).clone(),
                    sender_public_key,
                    transfer_logs: transfer_logs.remove(&hash).unwrap_or_default(),
                }
            })
            .collect();

        Ok(Some(EthBlock {
            number,
            hash: block.header.hash,
            transactions,
        }))
    }
}
