//! Deposit Scanner
//!
//! Purpose:
//!     Decode a range of Neo or Ethereum blocks against a bridge address and
//!     print every deposit found. Read-only: nothing is persisted and no
//!     settlement is attempted. Useful to check a start height or to confirm
//!     that a reported deposit is visible to the watcher.
//!
//! Usage:
//!     cargo run --release --bin scan-blocks -- --platform neo \
//!         --address <neo address> --from 4261049 --to 4261100
//!     cargo run --release --bin scan-blocks -- --config swapper.toml --platform ethereum \
//!         --address 0x... --from 19000000

use anyhow::{bail, Context, Result};
use bridge_swapper::chain::eth::{AlloyEthChain, EthBlockSource};
use bridge_swapper::chain::neo::{NeoBlockSource, NeoRpcClient, UInt160};
use bridge_swapper::crawler::BlockSource;
use bridge_swapper::telemetry::init_tracing;
use bridge_swapper::{AssetRegistry, FetchError, SwapperConfig};
use alloy::primitives::Address;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

// ── CLI Arguments ───────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "scan-blocks", about = "Decode bridge deposits in a block range")]
struct Args {
    /// Swapper configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Platform to scan (neo, ethereum)
    #[arg(short, long, default_value = "neo")]
    platform: String,

    /// Bridge receive address on that platform
    #[arg(short, long)]
    address: String,

    /// First height to scan
    #[arg(long)]
    from: u64,

    /// Last height to scan (default: newest available)
    #[arg(long)]
    to: Option<u64>,

    /// Node URL, overrides the configuration
    #[arg(long, env = "SWAPPER_RPC_URL")]
    rpc_url: Option<String>,
}

fn build_source(args: &Args, config: &SwapperConfig) -> Result<Box<dyn BlockSource>> {
    let home = &config.general.home_platform;
    match args.platform.as_str() {
        "neo" => {
            let url = args
                .rpc_url
                .as_deref()
                .or(config.neo.rpc_url.as_deref())
                .context("No Neo RPC URL: pass --rpc-url or set [neo] rpc_url")?;
            let address = UInt160::from_address(&args.address)
                .with_context(|| format!("Invalid Neo address {}", args.address))?;
            let node = Arc::new(NeoRpcClient::new(url)?);
            Ok(Box::new(NeoBlockSource::new(node, address, AssetRegistry::neo(), home)))
        }
        "ethereum" => {
            let url = args
                .rpc_url
                .as_deref()
                .or(config.ethereum.rpc_url.as_deref())
                .context("No Ethereum RPC URL: pass --rpc-url or set [ethereum] rpc_url")?;
            let address: Address = args
                .address
                .parse()
                .with_context(|| format!("Invalid Ethereum address {}", args.address))?;
            let chain = Arc::new(AlloyEthChain::connect_http(url)?);
            Ok(Box::new(EthBlockSource::new(
                chain,
                address,
                Vec::new(),
                config.ethereum_registry(),
                home,
                config.ethereum.confirmations,
            )))
        }
        other => bail!("Unsupported platform {}", other),
    }
}

// ── Main ────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SwapperConfig::load(path)?,
        None => SwapperConfig::default(),
    };
    init_tracing(&config.general.log_level);

    let source = build_source(&args, &config)?;
    let available = source
        .current_height()
        .await
        .context("Failed to read chain height")?;
    if available == 0 {
        bail!("{} node has no fetchable blocks", args.platform);
    }
    let last = args.to.unwrap_or(available - 1).min(available - 1);

    info!("===========================================");
    info!("   Bridge Deposit Scan");
    info!("===========================================");
    info!("Platform: {}", args.platform);
    info!("Address: {}", args.address);
    info!("Range: {} - {}", args.from, last);

    let mut deposits = 0usize;
    for height in args.from..=last {
        let block = match source.fetch_block(height).await {
            Ok(block) => block,
            Err(FetchError::BlockNotAvailable(h)) => {
                warn!("Block {} not available, stopping", h);
                break;
            }
            Err(e) => {
                warn!("Failed to fetch block {}: {}", height, e);
                continue;
            }
        };

        for tx in &block.transactions {
            for transfer in &tx.transfers {
                deposits += 1;
                info!(
                    "block {} tx {}: {} {} from {} for {}",
                    height,
                    tx.hash.map(|h| h.to_string()).unwrap_or_default(),
                    transfer.amount,
                    transfer.symbol,
                    transfer.source_address,
                    transfer.interop_address
                );
            }
        }
    }

    info!("Scan complete: {} deposits found", deposits);
    Ok(())
}
