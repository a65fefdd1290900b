//! eventsync CLI — run a token-transfer sync and manage its cursors.
//!
//! # Commands
//! ```text
//! eventsync sync   --chain-id <id> --contract <addr> --wallet <addr> [--once]
//! eventsync status [--chain-id <id>] [--json]
//! eventsync reset  --chain-id <id> --contract <addr>
//! eventsync info
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use eventsync_core::TransferKind;

mod cmd_cursor;
mod cmd_sync;
mod config;
mod logging;

use config::CliConfig;

#[derive(Parser)]
#[command(
    name = "eventsync",
    about = "Incremental ERC-20/721/1155 transfer log sync — EventSync CLI",
    long_about = "
EventSync CLI: scan a token contract's transfer logs for one wallet, backfill
history and then follow the chain head, persisting progress in SQLite.

ENVIRONMENT VARIABLES:
  EVENTSYNC_RPC_<CHAIN_ID>   RPC URL for a chain, e.g. EVENTSYNC_RPC_137
  RUST_LOG                   Log filter (overrides the config file)
",
    version
)]
struct Cli {
    /// JSON config file (log levels, RPC URLs, chain limit overrides)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one token contract for one wallet
    Sync {
        #[arg(long)]
        chain_id: u64,
        /// Token contract address
        #[arg(long)]
        contract: String,
        /// Wallet matched as sender or receiver
        #[arg(long)]
        wallet: String,
        /// Token standard: erc20 | erc721 | erc1155
        #[arg(long, default_value = "erc20")]
        kind: TransferKind,
        /// RPC URL (overrides env EVENTSYNC_RPC_<CHAIN_ID>)
        #[arg(long)]
        rpc: Option<String>,
        /// Seconds between cycles once caught up
        #[arg(long, default_value_t = 12)]
        interval: u64,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show stored sync cursors
    Status {
        /// Only show this chain
        #[arg(long)]
        chain_id: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset a cursor so the next sync starts a full rescan
    Reset {
        #[arg(long)]
        chain_id: u64,
        #[arg(long)]
        contract: String,
    },

    /// Show build info and provider limits
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db = db;
    }
    logging::init_tracing(&config.log);

    match cli.command {
        Commands::Sync { chain_id, contract, wallet, kind, rpc, interval, once } => {
            let rpc_url = config.rpc_url(chain_id, rpc.as_deref())?;
            let args = cmd_sync::SyncArgs {
                chain_id,
                contract,
                wallet,
                kind,
                rpc_url,
                interval: std::time::Duration::from_secs(interval),
                once,
            };
            cmd_sync::run(&config, args).await
        }

        Commands::Status { chain_id, json } => cmd_cursor::status(&config, chain_id, json).await,

        Commands::Reset { chain_id, contract } => cmd_cursor::reset(&config, chain_id, &contract).await,

        Commands::Info => cmd_info(&config),
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

fn cmd_info(config: &CliConfig) -> Result<()> {
    use eventsync_core::limits::{
        ChainLimitRegistry, OKX_CHAIN_ID, POLYGON_AMOY_CHAIN_ID, POLYGON_CHAIN_ID, POLYGON_MUMBAI_CHAIN_ID,
    };

    let registry = ChainLimitRegistry::new().with_overrides(&config.chains);
    let defaults = registry.limits(1);

    println!("EventSync v{}", env!("CARGO_PKG_VERSION"));
    println!("  Database:          {}", config.db);
    println!("  Storage backends:  memory, SQLite");
    println!("  Token standards:   erc20, erc721, erc1155");
    println!(
        "  Default limits:    max range {} blocks, enforced: {}, batch limit {}",
        defaults.max_range, defaults.range_limit_enforced, defaults.batch_limit
    );

    let mut chains: Vec<u64> = vec![OKX_CHAIN_ID, POLYGON_CHAIN_ID, POLYGON_MUMBAI_CHAIN_ID, POLYGON_AMOY_CHAIN_ID];
    chains.extend(config.chains.keys().copied());
    chains.sort_unstable();
    chains.dedup();

    println!("  Per-chain limits:");
    for chain_id in chains {
        let l = registry.limits(chain_id);
        println!(
            "    {:>8}  max range {:>7}  enforced: {:<5}  batch limit {}",
            chain_id, l.max_range, l.range_limit_enforced, l.batch_limit
        );
    }
    Ok(())
}
