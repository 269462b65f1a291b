//! Settlement strategies
//!
//! Purpose:
//!     Move funds out of the bridge on an external chain once a home-chain
//!     deposit asks for it. One strategy per destination platform; only Neo
//!     is wired.

use crate::chain::neo::{NeoTransferSender, OutboundKind, OutboundTransfer, UInt160};
use crate::error::{SettlementRejected, SwapResult};
use crate::swap::ledger::TokenInfo;
use crate::types::NEO_PLATFORM;
use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait SettlementStrategy: Send + Sync {
    fn platform(&self) -> &str;

    /// Pay `amount` (token base units) to `destination`. Returns the
    /// external transaction hash, or `None` when nothing was sent.
    async fn move_funds(
        &self,
        destination: &str,
        token: &TokenInfo,
        amount: U256,
    ) -> SwapResult<Option<B256>>;
}

/// Base units to a whole-unit decimal with the token's precision
pub fn to_decimal(amount: U256, decimals: u8) -> Result<Decimal, SettlementRejected> {
    let raw = u128::try_from(amount)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| SettlementRejected::InvalidAmount(amount.to_string()))?;
    Decimal::try_from_i128_with_scale(raw, decimals as u32)
        .map(|d| d.normalize())
        .map_err(|_| SettlementRejected::InvalidAmount(amount.to_string()))
}

pub struct NeoSettlement {
    sender: Arc<dyn NeoTransferSender>,
}

impl NeoSettlement {
    pub fn new(sender: Arc<dyn NeoTransferSender>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SettlementStrategy for NeoSettlement {
    fn platform(&self) -> &str {
        NEO_PLATFORM
    }

    async fn move_funds(
        &self,
        destination: &str,
        token: &TokenInfo,
        amount: U256,
    ) -> SwapResult<Option<B256>> {
        let destination = UInt160::from_address(destination)
            .ok_or_else(|| SettlementRejected::InvalidDestination(destination.to_string()))?;
        let total = to_decimal(amount, token.decimals)?;

        // Global assets travel as UTXO sends, everything else as NEP5
        let kind = match token.symbol.as_str() {
            "NEO" | "GAS" => OutboundKind::Asset,
            _ => OutboundKind::Nep5,
        };

        info!(
            "Sending {} {} to Neo address {} ({:?})",
            total,
            token.symbol,
            destination.to_address(),
            kind
        );
        let hash = self
            .sender
            .send(OutboundTransfer {
                kind,
                destination,
                symbol: token.symbol.clone(),
                total,
            })
            .await?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwapError;
    use crate::test_utils::{script_hash, FakeNeoSender};
    use rust_decimal_macros::dec;

    fn token(symbol: &str, decimals: u8) -> TokenInfo {
        TokenInfo {
            symbol: symbol.to_string(),
            decimals,
        }
    }

    #[test]
    fn test_to_decimal_applies_precision() {
        assert_eq!(to_decimal(U256::from(150_000_000u64), 8).unwrap(), dec!(1.5));
        assert_eq!(to_decimal(U256::from(3u64), 0).unwrap(), dec!(3));
        assert!(to_decimal(U256::MAX, 8).is_err());
    }

    #[tokio::test]
    async fn test_global_asset_and_nep5_routes() {
        let sender = Arc::new(FakeNeoSender::default());
        let settlement = NeoSettlement::new(sender.clone());
        let destination = script_hash(0x42).to_address();

        let first = settlement
            .move_funds(&destination, &token("GAS", 8), U256::from(200_000_000u64))
            .await
            .unwrap();
        settlement
            .move_funds(&destination, &token("SOUL", 8), U256::from(50_000_000u64))
            .await
            .unwrap();

        assert_eq!(first, Some(B256::repeat_byte(1)));
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, OutboundKind::Asset);
        assert_eq!(sent[0].total, dec!(2));
        assert_eq!(sent[0].destination, script_hash(0x42));
        assert_eq!(sent[1].kind, OutboundKind::Nep5);
        assert_eq!(sent[1].total, dec!(0.5));
    }

    #[tokio::test]
    async fn test_invalid_destination_sends_nothing() {
        let sender = Arc::new(FakeNeoSender::default());
        let settlement = NeoSettlement::new(sender.clone());

        let result = settlement
            .move_funds("0xdeadbeef", &token("NEO", 0), U256::from(1u64))
            .await;
        assert!(matches!(
            result,
            Err(SwapError::Settlement(SettlementRejected::InvalidDestination(_)))
        ));
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
