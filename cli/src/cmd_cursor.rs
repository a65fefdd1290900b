//! `eventsync status` and `eventsync reset`.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use eventsync_core::config::normalize_address;
use eventsync_core::{CursorManager, SyncState};
use eventsync_storage::sqlite::CursorRow;
use eventsync_storage::SqliteStorage;

use crate::config::CliConfig;

async fn open(config: &CliConfig) -> Result<SqliteStorage> {
    SqliteStorage::open(&config.db)
        .await
        .with_context(|| format!("opening database '{}'", config.db))
}

fn state_name(row: &CursorRow) -> String {
    SyncState::from_ordinal(row.record.state)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("corrupt({})", row.record.state))
}

fn updated_at(row: &CursorRow) -> String {
    chrono::DateTime::from_timestamp(row.record.updated_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| row.record.updated_at.to_string())
}

pub async fn status(config: &CliConfig, chain_id: Option<u64>, as_json: bool) -> Result<()> {
    let storage = open(config).await?;
    let rows: Vec<CursorRow> = storage
        .list_cursors()
        .await?
        .into_iter()
        .filter(|r| chain_id.map_or(true, |id| r.chain_id == id))
        .collect();

    if as_json {
        let out: Vec<_> = rows
            .iter()
            .map(|r| {
                json!({
                    "chain_id": r.chain_id,
                    "address": r.address,
                    "state": state_name(r),
                    "last_read_block": r.record.last_read_block,
                    "window_size": r.record.window_size,
                    "sync_start_block": r.record.sync_start_block,
                    "updated_at": updated_at(r),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No cursors stored in '{}'", config.db);
        return Ok(());
    }
    println!(
        "{:>8}  {:<42}  {:<22}  {:>12}  {:>10}  {:>12}  updated",
        "chain", "contract", "state", "last read", "window", "sync start"
    );
    for r in &rows {
        println!(
            "{:>8}  {:<42}  {:<22}  {:>12}  {:>10}  {:>12}  {}",
            r.chain_id,
            r.address,
            state_name(r),
            r.record.last_read_block,
            r.record.window_size,
            r.record.sync_start_block,
            updated_at(r)
        );
    }
    Ok(())
}

pub async fn reset(config: &CliConfig, chain_id: u64, contract: &str) -> Result<()> {
    let address = normalize_address(contract).with_context(|| format!("invalid contract address: {contract}"))?;
    let storage = Arc::new(open(config).await?);
    let cursor = CursorManager::new(storage, chain_id, &address).reset().await?;
    tracing::info!(chain_id, address = %address, state = %cursor.state, "cursor reset");
    println!("Reset cursor for {address} on chain {chain_id}; the next sync starts a full rescan.");
    Ok(())
}
