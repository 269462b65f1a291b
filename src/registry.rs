//! Swappable Asset Registry
//!
//! Purpose:
//!     Static lookup from a chain-specific asset identifier (Neo asset id,
//!     NEP5 contract hash, ERC20 contract address) to a supported symbol and
//!     its decimal precision. Anything missing here is not swappable.

use std::collections::HashMap;

/// Neo symbols: (symbol, decimals)
pub const NEO_TOKEN_DECIMALS: &[(&str, u8)] = &[("NEO", 0), ("GAS", 8), ("SOUL", 8)];

/// Neo asset ids and NEP5 contract hashes, display (big-endian) hex
pub const NEO_ASSETS: &[(&str, &str)] = &[
    ("b3a766ac60afa2990d9251db08138fd1facf07ed", "SOUL"),
    ("ed07cffad18f1308db51920d99a2af60ac66a7b3", "SOUL"),
    (
        "c56f33fc6ecfcd0c225c4ab356fee59390af8560be0e930faebe74a6daff7c9b",
        "NEO",
    ),
    (
        "602c79718b16e442de58778e148d0b1084e3b2dffd5de6b7b16cee7969282de7",
        "GAS",
    ),
];

#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    /// normalized asset id -> symbol
    symbols: HashMap<String, String>,
    /// symbol -> decimals
    decimals: HashMap<String, u8>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for the Neo bridge: NEO, GAS and SOUL
    pub fn neo() -> Self {
        let mut registry = Self::new();
        for (symbol, decimals) in NEO_TOKEN_DECIMALS {
            registry.decimals.insert(symbol.to_string(), *decimals);
        }
        for (asset, symbol) in NEO_ASSETS {
            registry.symbols.insert(normalize(asset), symbol.to_string());
        }
        registry
    }

    pub fn with_asset(mut self, asset: &str, symbol: &str) -> Self {
        self.insert(asset, symbol);
        self
    }

    pub fn with_decimals(mut self, symbol: &str, decimals: u8) -> Self {
        self.decimals.insert(symbol.to_string(), decimals);
        self
    }

    pub fn insert(&mut self, asset: &str, symbol: &str) {
        self.symbols.insert(normalize(asset), symbol.to_string());
    }

    /// Symbol for an asset id; accepts optional 0x prefix and any hex case
    pub fn symbol_for(&self, asset: &str) -> Option<&str> {
        self.symbols.get(&normalize(asset)).map(String::as_str)
    }

    pub fn decimals(&self, symbol: &str) -> Option<u8> {
        self.decimals.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

fn normalize(asset: &str) -> String {
    let trimmed = asset.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neo_registry_lookups() {
        let registry = AssetRegistry::neo();
        assert_eq!(
            registry.symbol_for("0xc56f33fc6ecfcd0c225c4ab356fee59390af8560be0e930faebe74a6daff7c9b"),
            Some("NEO")
        );
        assert_eq!(
            registry.symbol_for("ED07CFFAD18F1308DB51920D99A2AF60AC66A7B3"),
            Some("SOUL")
        );
        assert_eq!(registry.decimals("GAS"), Some(8));
        assert_eq!(registry.decimals("NEO"), Some(0));
        assert!(registry.symbol_for("deadbeef").is_none());
    }

    #[test]
    fn test_custom_assets() {
        let registry = AssetRegistry::new()
            .with_asset("0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT")
            .with_decimals("USDT", 6);
        assert_eq!(
            registry.symbol_for("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            Some("USDT")
        );
        assert_eq!(registry.decimals("USDT"), Some(6));
        assert_eq!(registry.len(), 1);
    }
}
