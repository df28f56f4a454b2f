//! `relay-engine` command line.
//!
//! The relayer key is read from `RELAYER_PRIVATE_KEY`; everything else comes
//! from the TOML file given with `--config` (defaults when omitted).

use alloy::primitives::{Address, Bytes, TxHash, U256};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relay_engine::chain::{AlloyChainClient, ChainRpc, RelayerIdentity};
use relay_engine::config::{load_config, RelayConfig};
use relay_engine::observability::{logging, metrics};
use relay_engine::relay::{RelayEngine, RelayOptions, RelayRequest, RelayState, SystemClock};

#[derive(Parser)]
#[command(name = "relay-engine")]
#[command(about = "Relay transactions through a single signing identity", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a transaction and wait for its outcome
    Relay {
        #[arg(long)]
        to: Address,
        #[arg(long, default_value = "0x")]
        data: Bytes,
        /// Value in wei
        #[arg(long, default_value = "0")]
        value: U256,
        /// Give up waiting for inclusion after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Estimate the fee of a call without submitting it
    Estimate {
        #[arg(long)]
        to: Address,
        #[arg(long, default_value = "0x")]
        data: Bytes,
        #[arg(long, default_value = "0")]
        value: U256,
    },
    /// Look up the receipt of a transaction
    Receipt { tx_hash: TxHash },
    /// Show relayer account state
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        rpc_url = %config.chain.rpc_url,
        chain_id = config.chain.chain_id,
        "relay-engine v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let client = AlloyChainClient::new(config.chain.clone()).await?;
    let rpc: Arc<dyn ChainRpc> = Arc::new(client);
    let identity = RelayerIdentity::from_env(config.chain.chain_id)?;
    let engine = RelayEngine::new(&config, rpc, identity, Arc::new(SystemClock::new())).await?;

    match cli.command {
        Commands::Relay {
            to,
            data,
            value,
            deadline_secs,
        } => {
            let options = RelayOptions {
                deadline: deadline_secs.map(Duration::from_secs),
            };
            let handle = engine.submit_relay_with(RelayRequest::new(to, data, value), options);
            tracing::info!(request_id = %handle.id(), "Waiting for relay outcome");

            let outcome = handle.wait().await;
            print_json(&outcome)?;
            if outcome.state != RelayState::Included {
                std::process::exit(1);
            }
        }
        Commands::Estimate { to, data, value } => {
            print_json(&engine.estimate_fee(to, data, value).await?)?;
        }
        Commands::Receipt { tx_hash } => {
            print_json(&engine.get_receipt(tx_hash).await?)?;
        }
        Commands::Stats => {
            print_json(&engine.stats().await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
