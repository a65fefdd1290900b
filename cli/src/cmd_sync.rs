//! `eventsync sync` — drive one engine against a live RPC endpoint.
//!
//! Each tick refreshes the chain head with `eth_blockNumber`, then runs one
//! cycle. While the cursor is still backfilling or catching up the next
//! cycle starts right away; once it follows the head it sleeps `interval`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use eventsync_core::{ChainLimitRegistry, HeadCache, SyncConfig, SyncState, TransferKind};
use eventsync_evm::{EventSyncBuilder, HttpTransport, RpcLogClient};
use eventsync_storage::SqliteStorage;

use crate::config::CliConfig;

pub struct SyncArgs {
    pub chain_id: u64,
    pub contract: String,
    pub wallet: String,
    pub kind: TransferKind,
    pub rpc_url: String,
    pub interval: Duration,
    pub once: bool,
}

pub async fn run(config: &CliConfig, args: SyncArgs) -> Result<()> {
    let storage = Arc::new(
        SqliteStorage::open(&config.db)
            .await
            .with_context(|| format!("opening database '{}'", config.db))?,
    );
    let heads = Arc::new(HeadCache::new());
    let limits = Arc::new(ChainLimitRegistry::new().with_overrides(&config.chains));
    let client = RpcLogClient::new(HttpTransport::default_for(args.rpc_url.clone())?);

    let engine = EventSyncBuilder::new(SyncConfig::new(args.chain_id, &args.contract, &args.wallet))
        .transfer_kind(args.kind)
        .cursor_store(storage.clone())
        .head_provider(heads.clone())
        .limits(limits)
        .processor(storage.clone())
        .sink(storage.clone())
        .build(client)?;

    info!(
        chain_id = args.chain_id,
        contract = %engine.config().contract_address,
        wallet = %engine.config().wallet_address,
        kind = ?args.kind,
        rpc = %args.rpc_url,
        "starting sync"
    );

    loop {
        match engine.fetcher().client().block_number().await {
            Ok(height) => {
                heads.update(args.chain_id, height);
            }
            Err(e) if args.once => return Err(e).context("reading chain head"),
            Err(e) => warn!(chain_id = args.chain_id, error = %e, "failed to read chain head"),
        }

        let catching_up = match engine.sync_once().await {
            Ok(Some(report)) => {
                info!(
                    chain_id = args.chain_id,
                    window = %report.window,
                    received = report.received,
                    sent = report.sent,
                    tx_count = report.tx_hashes.len(),
                    "cycle complete"
                );
                matches!(report.window.state, SyncState::DownwardSync | SyncState::UpwardSync)
            }
            Ok(None) => {
                debug!(chain_id = args.chain_id, "no window this tick");
                false
            }
            Err(e) if args.once => return Err(e.into()),
            Err(e) => {
                warn!(chain_id = args.chain_id, error = %e, "cycle failed");
                false
            }
        };

        if args.once {
            return Ok(());
        }
        if catching_up {
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(args.interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping sync");
                return Ok(());
            }
        }
    }
}
