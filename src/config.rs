//! Configuration
//!
//! Reads swapper settings from a TOML file. Every option has a default, so an
//! empty file is a valid configuration.
//!
//! Example:
//! ```text
//!     [general]
//!     home_platform = "phantasma"
//!     batch_cap = 8
//!
//!     [neo]
//!     rpc_url = "http://seed1.neo.org:10332"
//!     quick_sync = true
//!
//!     [ethereum]
//!     enabled = true
//!     confirmations = 12
//!     watched_addresses = ["0x..."]
//!     tokens = { "0xdac17f958d2ee523a2206206994597c13d831ec7" = "USDT" }
//! ```

use crate::crawler::RetryPolicy;
use crate::error::ConfigError;
use crate::registry::AssetRegistry;
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Hard upper bound on concurrent block fetches per batch
pub const MAX_BATCH_CAP: u64 = 8;

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwapperConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub neo: NeoConfig,
    #[serde(default)]
    pub ethereum: EthereumConfig,
}

/// Settings shared by every watcher and the orchestrator
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_home_platform")]
    pub home_platform: String,
    #[serde(default = "default_home_chain")]
    pub home_chain: String,
    /// Fee attached to settle transactions on the home ledger
    #[serde(default = "default_minimum_fee")]
    pub minimum_fee: u64,
    #[serde(default = "default_batch_cap")]
    pub batch_cap: u64,
    #[serde(default = "default_settle_debounce")]
    pub settle_debounce_secs: u64,
    #[serde(default = "default_retry_initial")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_cap")]
    pub retry_cap_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between orchestrator polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_home_platform() -> String { "phantasma".to_string() }
fn default_home_chain() -> String { "main".to_string() }
fn default_minimum_fee() -> u64 { 100_000 }
fn default_batch_cap() -> u64 { MAX_BATCH_CAP }
fn default_settle_debounce() -> u64 { 30 }
fn default_retry_initial() -> u64 { 1_000 }
fn default_retry_cap() -> u64 { 60_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_poll_interval() -> u64 { 5_000 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            home_platform: default_home_platform(),
            home_chain: default_home_chain(),
            minimum_fee: default_minimum_fee(),
            batch_cap: default_batch_cap(),
            settle_debounce_secs: default_settle_debounce(),
            retry_initial_ms: default_retry_initial(),
            retry_cap_ms: default_retry_cap(),
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Neo watcher settings
#[derive(Debug, Clone, Deserialize)]
pub struct NeoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub rpc_url: Option<String>,
    /// Height used when the store has no frontier yet
    #[serde(default = "default_neo_start_height")]
    pub start_height: u64,
    #[serde(default)]
    pub quick_sync: bool,
    /// Contract the quick-sync index tracks
    #[serde(default = "default_quick_sync_contract")]
    pub quick_sync_contract: String,
}

fn default_true() -> bool { true }
fn default_neo_start_height() -> u64 { 4_261_049 }
fn default_quick_sync_contract() -> String {
    "ed07cffad18f1308db51920d99a2af60ac66a7b3".to_string()
}

impl Default for NeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rpc_url: None,
            start_height: default_neo_start_height(),
            quick_sync: false,
            quick_sync_contract: default_quick_sync_contract(),
        }
    }
}

/// Ethereum watcher settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EthereumConfig {
    #[serde(default)]
    pub enabled: bool,
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub start_height: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Extra addresses to watch besides the registered bridge address
    #[serde(default)]
    pub watched_addresses: Vec<String>,
    /// ERC20 contract address -> symbol
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

fn default_confirmations() -> u64 { 12 }

impl SwapperConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let general = &self.general;
        if general.batch_cap == 0 || general.batch_cap > MAX_BATCH_CAP {
            return Err(ConfigError::Invalid(format!(
                "batch_cap must be within 1..={}, got {}",
                MAX_BATCH_CAP, general.batch_cap
            )));
        }
        if general.retry_initial_ms == 0 || general.retry_cap_ms < general.retry_initial_ms {
            return Err(ConfigError::Invalid(format!(
                "retry backoff must satisfy 0 < initial ({}ms) <= cap ({}ms)",
                general.retry_initial_ms, general.retry_cap_ms
            )));
        }
        if general.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".to_string()));
        }
        if general.home_platform.is_empty() {
            return Err(ConfigError::Invalid("home_platform is empty".to_string()));
        }
        for address in &self.ethereum.watched_addresses {
            address.parse::<Address>().map_err(|e| {
                ConfigError::Invalid(format!("watched address {}: {}", address, e))
            })?;
        }
        for contract in self.ethereum.tokens.keys() {
            contract.parse::<Address>().map_err(|e| {
                ConfigError::Invalid(format!("token contract {}: {}", contract, e))
            })?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.general.retry_initial_ms),
            Duration::from_millis(self.general.retry_cap_ms),
        )
    }

    pub fn settle_debounce(&self) -> Duration {
        Duration::from_secs(self.general.settle_debounce_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.poll_interval_ms)
    }

    pub fn minimum_fee(&self) -> U256 {
        U256::from(self.general.minimum_fee)
    }

    /// ERC20 registry built from `[ethereum.tokens]`
    pub fn ethereum_registry(&self) -> AssetRegistry {
        let mut registry = AssetRegistry::new();
        for (contract, symbol) in &self.ethereum.tokens {
            registry.insert(contract, symbol);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SwapperConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.home_platform, "phantasma");
        assert_eq!(config.general.home_chain, "main");
        assert_eq!(config.general.batch_cap, 8);
        assert_eq!(config.settle_debounce(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.neo.start_height, 4_261_049);
        assert!(config.neo.enabled);
        assert!(!config.neo.quick_sync);
        assert!(!config.ethereum.enabled);
        assert_eq!(config.ethereum.confirmations, 12);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[general]
batch_cap = 4
settle_debounce_secs = 10
minimum_fee = 5

[neo]
rpc_url = "http://localhost:10332"
start_height = 100
quick_sync = true

[ethereum]
enabled = true
confirmations = 3
watched_addresses = ["0x000000000000000000000000000000000000dEaD"]
tokens = { "0xdac17f958d2ee523a2206206994597c13d831ec7" = "USDT" }
"#;

        let config = SwapperConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.batch_cap, 4);
        assert_eq!(config.settle_debounce(), Duration::from_secs(10));
        assert_eq!(config.minimum_fee(), U256::from(5u64));
        assert_eq!(config.neo.rpc_url.as_deref(), Some("http://localhost:10332"));
        assert!(config.neo.quick_sync);
        assert_eq!(config.ethereum.confirmations, 3);
        assert_eq!(
            config
                .ethereum_registry()
                .symbol_for("0xDAC17F958D2EE523A2206206994597C13D831EC7"),
            Some("USDT")
        );
    }

    #[test]
    fn test_rejects_oversized_batch() {
        let err = SwapperConfig::from_toml_str("[general]\nbatch_cap = 9\n").unwrap_err();
        assert!(err.to_string().contains("batch_cap") || format!("{:#}", err).contains("batch_cap"));
        assert!(SwapperConfig::from_toml_str("[general]\nbatch_cap = 0\n").is_err());
    }

    #[test]
    fn test_rejects_bad_watched_address() {
        let toml_str = "[ethereum]\nwatched_addresses = [\"not-an-address\"]\n";
        tokio_test::assert_err!(SwapperConfig::from_toml_str(toml_str));
    }
}
