//! Error Taxonomy
//!
//! Purpose:
//!     Separate error kinds so callers can pick a policy without inspecting
//!     messages: abort (ConfigError), retry (FetchError), skip (DecodeReject),
//!     or log-and-return-nothing (SettlementRejected).

use alloy::primitives::B256;
use thiserror::Error;

/// Fatal for the affected watcher or settlement attempt, never for the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no interop address registered for platform {0}")]
    MissingLocalAddress(String),

    #[error("invalid {platform} receive address {address:?}")]
    InvalidLocalAddress { platform: String, address: String },

    #[error("invalid source platform {source_platform}: only {home} can settle to external chains")]
    InvalidSourcePlatform {
        source_platform: String,
        home: String,
    },

    #[error("stored height {value:?} for {platform}/{chain} is not a decimal number")]
    InvalidHeight {
        platform: String,
        chain: String,
        value: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Transient node/store failure. Block fetches retry these forever.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("block {0} is not available yet")]
    BlockNotAvailable(u64),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("malformed node response: {0}")]
    Malformed(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Why a raw transaction produced no transfers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeReject {
    #[error("expected exactly one witness, found {0}")]
    WitnessCount(usize),

    #[error("witness does not carry a single-signature verification script")]
    UnsignedWitness,

    #[error("asset {0} is not swappable")]
    UnsupportedAsset(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("malformed script: {0}")]
    MalformedScript(String),

    #[error("script does not match the bridge transfer template: {0}")]
    ScriptTemplate(&'static str),

    #[error("application log unavailable: {0}")]
    ExecutionLog(String),

    #[error("no interop address for sender")]
    MissingInteropAddress,

    #[error("no transfers to the bridge address")]
    NoTransfers,
}

/// Settlement refused without any state change; safe to retry with corrected input.
#[derive(Debug, Clone, Error)]
pub enum SettlementRejected {
    #[error("swap {hash} carries {count} transfers, only single-transfer swaps are supported")]
    MultipleTransfers { hash: B256, count: usize },

    #[error("token {0} is unknown to the ledger")]
    UnknownToken(String),

    #[error("destination {0:?} is not a valid address for the target chain")]
    InvalidDestination(String),

    #[error("amount {0} cannot be expressed on the target chain")]
    InvalidAmount(String),
}

/// Umbrella error for orchestrator and crawler entry points.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Settlement(#[from] SettlementRejected),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("fetch task failed: {0}")]
    Task(String),
}

pub type SwapResult<T> = Result<T, SwapError>;
