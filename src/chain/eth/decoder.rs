//! Ethereum Transaction Decoder
//!
//! Purpose:
//!     Turn one matched Ethereum transaction into canonical transfers to the
//!     bridge swap address, or "not relevant".
//!
//! Rules:
//!     - ERC20 `Transfer` logs paying the swap address: the token contract must
//!       be registered, otherwise that event alone is skipped
//!     - Native value paid to the swap address becomes one `ETH` transfer
//!     - Interop address from the UTF-8 call data, else from the sender key;
//!       a transaction with neither is not relevant

use super::types::EthTransaction;
use crate::address::InteropAddress;
use crate::error::DecodeReject;
use crate::registry::AssetRegistry;
use crate::types::{InteropTransaction, InteropTransfer, ETHEREUM_PLATFORM, NATIVE_ETH_SYMBOL};
use alloy::primitives::{Address, U256};
use tracing::debug;

pub struct EthDecodeContext<'a> {
    /// Bridge-controlled Ethereum account
    pub swap_address: Address,
    /// ERC20 contract -> symbol
    pub registry: &'a AssetRegistry,
    pub home_platform: &'a str,
}

/// Address the depositor asked to be credited
pub fn interop_address(tx: &EthTransaction) -> Option<InteropAddress> {
    std::str::from_utf8(&tx.input)
        .ok()
        .and_then(|text| InteropAddress::from_text(text.trim()))
        .or_else(|| {
            tx.sender_public_key
                .as_ref()
                .and_then(|key| InteropAddress::from_public_key(key))
        })
}

pub fn encode_address(address: &Address) -> String {
    address.to_checksum(None)
}

/// Decode one transaction. Never fails.
pub fn decode_transaction(tx: &EthTransaction, ctx: &EthDecodeContext<'_>) -> InteropTransaction {
    match try_decode(tx, ctx) {
        Ok(transfers) => InteropTransaction {
            hash: Some(tx.hash),
            transfers,
        },
        Err(reject) => {
            debug!("Ethereum tx {} not relevant: {}", tx.hash, reject);
            InteropTransaction::not_relevant()
        }
    }
}

fn try_decode(
    tx: &EthTransaction,
    ctx: &EthDecodeContext<'_>,
) -> Result<Vec<InteropTransfer>, DecodeReject> {
    let interop_address = interop_address(tx).ok_or(DecodeReject::MissingInteropAddress)?;
    let swap_address = encode_address(&ctx.swap_address);

    let transfer = |from: &Address, symbol: &str, amount: U256| InteropTransfer {
        source_platform: ETHEREUM_PLATFORM.to_string(),
        source_address: encode_address(from),
        destination_platform: ctx.home_platform.to_string(),
        destination_address: swap_address.clone(),
        interop_address,
        symbol: symbol.to_string(),
        amount,
    };

    let mut transfers = Vec::new();

    for log in tx.transfer_logs.iter().filter(|l| l.to == ctx.swap_address) {
        let contract = hex::encode(log.contract.as_slice());
        match ctx.registry.symbol_for(&contract) {
            Some(symbol) => transfers.push(transfer(&log.from, symbol, log.value)),
            None => debug!("Ethereum tx {}: token 0x{} not supported", tx.hash, contract),
        }
    }

    if !tx.value.is_zero() && tx.to == Some(ctx.swap_address) {
        transfers.push(transfer(&tx.from, NATIVE_ETH_SYMBOL, tx.value));
    }

    if transfers.is_empty() {
        return Err(DecodeReject::NoTransfers);
    }
    Ok(transfers)
}
