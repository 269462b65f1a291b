//! Neo Transaction Decoder
//!
//! Purpose:
//!     Turn one Neo transaction into canonical transfers to the bridge, or
//!     "not relevant". Total: every rejection is typed internally and
//!     collapses to the empty result at the boundary.
//!
//! Rules:
//!     - Exactly one witness; sender = its verification script hash
//!     - Interop address from the witness key, overridden by a Description
//!       attribute holding a valid address
//!     - UTXO outputs to the receive address: asset must be registered,
//!       otherwise the whole transaction is rejected
//!     - Invocation script must match the NEP5 transfer template; when it
//!       targets the receive address, transfers come from the application log

use super::node::NeoNode;
use super::script::TransferTemplate;
use super::types::{NeoBlock, NeoTransaction, NeoTxKind, UInt160, ATTRIBUTE_DESCRIPTION};
use crate::address::InteropAddress;
use crate::error::DecodeReject;
use crate::registry::AssetRegistry;
use crate::types::{DecodedBlock, InteropBlock, InteropTransaction, InteropTransfer, NEO_PLATFORM};
use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// Chain name Neo blocks are recorded under
pub const NEO_CHAIN: &str = "neo";

pub struct NeoDecodeContext<'a> {
    /// Bridge-controlled Neo account
    pub receive_address: UInt160,
    pub registry: &'a AssetRegistry,
    /// Platform credited for deposits
    pub home_platform: &'a str,
}

/// Decode one transaction. Never fails.
pub async fn decode_transaction<N>(
    tx: &NeoTransaction,
    ctx: &NeoDecodeContext<'_>,
    node: &N,
) -> InteropTransaction
where
    N: NeoNode + ?Sized,
{
    match try_decode(tx, ctx, node).await {
        Ok(transfers) => {
            debug!("Neo tx {}: {} transfers", tx.hash, transfers.len());
            InteropTransaction {
                hash: Some(tx.hash.to_b256()),
                transfers,
            }
        }
        Err(reject @ DecodeReject::ExecutionLog(_)) => {
            warn!("Neo tx {} looks like a swap but was dropped: {}", tx.hash, reject);
            InteropTransaction::not_relevant()
        }
        Err(reject) => {
            debug!("Neo tx {} not relevant: {}", tx.hash, reject);
            InteropTransaction::not_relevant()
        }
    }
}

async fn try_decode<N>(
    tx: &NeoTransaction,
    ctx: &NeoDecodeContext<'_>,
    node: &N,
) -> Result<Vec<InteropTransfer>, DecodeReject>
where
    N: NeoNode + ?Sized,
{
    let witness = match tx.witnesses.as_slice() {
        [witness] => witness,
        other => return Err(DecodeReject::WitnessCount(other.len())),
    };

    let mut interop_address = InteropAddress::from_verification_script(&witness.verification_script)
        .ok_or(DecodeReject::UnsignedWitness)?;
    let source_address = UInt160::from_script(&witness.verification_script).to_address();
    let bridge_address = ctx.receive_address.to_address();

    for attribute in tx.attributes.iter().filter(|a| a.usage == ATTRIBUTE_DESCRIPTION) {
        if let Some(address) = std::str::from_utf8(&attribute.data)
            .ok()
            .and_then(|text| InteropAddress::from_text(text.trim()))
        {
            interop_address = address;
        }
    }

    let transfer = |symbol: &str, amount: U256| InteropTransfer {
        source_platform: NEO_PLATFORM.to_string(),
        source_address: source_address.clone(),
        destination_platform: ctx.home_platform.to_string(),
        destination_address: bridge_address.clone(),
        interop_address,
        symbol: symbol.to_string(),
        amount,
    };

    let mut transfers = Vec::new();

    // ── UTXO outputs ──
    for output in tx.outputs.iter().filter(|o| o.script_hash == ctx.receive_address) {
        let asset = output.asset_id.to_display_hex();
        let symbol = ctx
            .registry
            .symbol_for(&asset)
            .ok_or(DecodeReject::UnsupportedAsset(asset))?;
        let decimals = ctx
            .registry
            .decimals(symbol)
            .ok_or_else(|| DecodeReject::UnsupportedAsset(symbol.to_string()))?;
        transfers.push(transfer(symbol, to_base_units(output.value, decimals)?));
    }

    // ── NEP5 invocation ──
    if let Some(script) = tx.script.as_deref().filter(|s| !s.is_empty()) {
        let template = TransferTemplate::parse(script)?;
        let contract = template.appcall_contract_hash.to_display_hex();
        if ctx.registry.symbol_for(&contract).is_none() {
            return Err(DecodeReject::UnsupportedAsset(contract));
        }

        if template.target_script_hash == ctx.receive_address {
            let log = node
                .application_log(&tx.hash)
                .await
                .map_err(|e| DecodeReject::ExecutionLog(e.to_string()))?;
            if log.is_empty() {
                warn!("Neo swap found but application log is empty for tx {}", tx.hash);
            }
            for entry in &log {
                let symbol = ctx
                    .registry
                    .symbol_for(&entry.contract)
                    .ok_or_else(|| DecodeReject::UnsupportedAsset(entry.contract.clone()))?;
                transfers.push(transfer(symbol, entry.amount));
            }
        }
    }

    if transfers.is_empty() {
        return Err(DecodeReject::NoTransfers);
    }
    Ok(transfers)
}

/// Whole-unit decimal value to the token's smallest unit, truncated
pub fn to_base_units(value: Decimal, decimals: u8) -> Result<U256, DecodeReject> {
    let scale = 10u64
        .checked_pow(decimals as u32)
        .map(Decimal::from)
        .ok_or_else(|| DecodeReject::InvalidAmount(format!("{} decimals", decimals)))?;
    value
        .checked_mul(scale)
        .map(|scaled| scaled.trunc())
        .and_then(|whole| whole.to_u128())
        .map(U256::from)
        .ok_or_else(|| DecodeReject::InvalidAmount(value.to_string()))
}

/// Decode every contract/invocation transaction of a block. The block is
/// always produced; its hash is `None` when nothing was relevant.
pub async fn make_interop_block<N>(
    block: &NeoBlock,
    ctx: &NeoDecodeContext<'_>,
    node: &N,
) -> DecodedBlock
where
    N: NeoNode + ?Sized,
{
    let mut transactions = Vec::new();
    for tx in &block.transactions {
        if !matches!(tx.kind, NeoTxKind::Contract | NeoTxKind::Invocation) {
            continue;
        }
        let decoded = decode_transaction(tx, ctx, node).await;
        if decoded.is_relevant() {
            transactions.push(decoded);
        }
    }

    let hash = (!transactions.is_empty()).then(|| block.hash.to_b256());
    DecodedBlock {
        block: InteropBlock {
            platform: NEO_PLATFORM.to_string(),
            chain: NEO_CHAIN.to_string(),
            height: block.height,
            hash,
            transaction_hashes: transactions.iter().filter_map(|tx| tx.hash).collect(),
        },
        transactions,
    }
}
