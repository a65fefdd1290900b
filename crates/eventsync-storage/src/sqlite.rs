//! SQLite storage backend.
//!
//! Persists sync cursors, matched transfers and the tx-hash queue to a single
//! SQLite file. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use eventsync_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./eventsync.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use eventsync_core::cursor::{CursorMutator, CursorRecord, CursorStore};
use eventsync_core::error::SyncError;
use eventsync_core::handler::{ProcessedLogs, RawLog, TransferContext, TransferProcessor, TxHashSink};
use eventsync_core::types::TransferDirection;

use crate::transfer::{direction_str, parse_direction, TransferRecord};

fn storage_err(e: impl std::fmt::Display) -> SyncError {
    SyncError::Storage(e.to_string())
}

/// A stored cursor row with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRow {
    pub chain_id: u64,
    pub address: String,
    pub record: CursorRecord,
}

/// SQLite-backed storage for cursors, transfers and queued tx hashes.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./eventsync.db"`) or a full
    /// SQLite URL (`"sqlite:./eventsync.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, SyncError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every connection to `sqlite::memory:` is its own database, so the pool
    /// is pinned to a single connection. All data is lost when it is dropped.
    pub async fn in_memory() -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), SyncError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cursors (
                chain_id         INTEGER NOT NULL,
                address          TEXT    NOT NULL,
                state            INTEGER NOT NULL,
                last_read_block  INTEGER NOT NULL,
                window_size      INTEGER NOT NULL,
                sync_start_block INTEGER NOT NULL,
                updated_at       INTEGER NOT NULL,
                PRIMARY KEY (chain_id, address)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transfers (
                chain_id     INTEGER NOT NULL,
                contract     TEXT    NOT NULL,
                wallet       TEXT    NOT NULL,
                direction    TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER,
                token_ids    TEXT    NOT NULL,
                data         TEXT    NOT NULL,
                PRIMARY KEY (chain_id, contract, tx_hash, log_index, direction)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tx_queue (
                chain_id  INTEGER NOT NULL,
                wallet    TEXT    NOT NULL,
                tx_hash   TEXT    NOT NULL,
                queued_at INTEGER NOT NULL,
                PRIMARY KEY (chain_id, wallet, tx_hash)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transfers_wallet ON transfers (chain_id, wallet);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    // ─── Cursor listing ─────────────────────────────────────────────────────────

    /// Every stored cursor, ordered by chain and address.
    pub async fn list_cursors(&self) -> Result<Vec<CursorRow>, SyncError> {
        let rows = sqlx::query(
            "SELECT chain_id, address, state, last_read_block, window_size, sync_start_block, updated_at
             FROM cursors ORDER BY chain_id, address",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|r| CursorRow {
                chain_id: r.get::<i64, _>("chain_id") as u64,
                address: r.get("address"),
                record: cursor_from_row(&r),
            })
            .collect())
    }

    // ─── Transfers ──────────────────────────────────────────────────────────────

    /// Insert a transfer; returns `false` if it was already stored.
    pub async fn insert_transfer(&self, record: &TransferRecord) -> Result<bool, SyncError> {
        let token_ids = serde_json::to_string(&record.token_ids).map_err(storage_err)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO transfers
             (chain_id, contract, wallet, direction, tx_hash, log_index, block_number, token_ids, data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.chain_id as i64)
        .bind(&record.contract_address)
        .bind(&record.wallet_address)
        .bind(direction_str(record.direction))
        .bind(&record.tx_hash)
        .bind(record.log_index as i64)
        .bind(record.block_number.map(|b| b as i64))
        .bind(&token_ids)
        .bind(&record.data)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    /// Stored transfers for one token contract, ordered by block and log index.
    pub async fn transfers_for(&self, chain_id: u64, contract: &str) -> Result<Vec<TransferRecord>, SyncError> {
        let rows = sqlx::query(
            "SELECT chain_id, contract, wallet, direction, tx_hash, log_index, block_number, token_ids, data
             FROM transfers WHERE chain_id = ? AND contract = ?
             ORDER BY block_number, log_index, direction",
        )
        .bind(chain_id as i64)
        .bind(contract.to_ascii_lowercase())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let direction: String = row.get("direction");
            let token_ids: String = row.get("token_ids");
            out.push(TransferRecord {
                chain_id: row.get::<i64, _>("chain_id") as u64,
                contract_address: row.get("contract"),
                wallet_address: row.get("wallet"),
                direction: parse_direction(&direction)
                    .ok_or_else(|| SyncError::Storage(format!("unknown transfer direction: {direction}")))?,
                tx_hash: row.get("tx_hash"),
                log_index: row.get::<i64, _>("log_index") as u64,
                block_number: row.get::<Option<i64>, _>("block_number").map(|b| b as u64),
                token_ids: serde_json::from_str(&token_ids).map_err(storage_err)?,
                data: row.get("data"),
            });
        }
        Ok(out)
    }

    pub async fn transfer_count(&self) -> Result<u64, SyncError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM transfers")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    /// Queued tx hashes for one wallet, oldest first.
    pub async fn queued_tx_hashes(&self, chain_id: u64, wallet: &str) -> Result<Vec<String>, SyncError> {
        let rows = sqlx::query(
            "SELECT tx_hash FROM tx_queue WHERE chain_id = ? AND wallet = ? ORDER BY queued_at, tx_hash",
        )
        .bind(chain_id as i64)
        .bind(wallet.to_ascii_lowercase())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(|r| r.get("tx_hash")).collect())
    }
}

fn cursor_from_row(r: &sqlx::sqlite::SqliteRow) -> CursorRecord {
    CursorRecord {
        state: r.get("state"),
        last_read_block: r.get("last_read_block"),
        window_size: r.get("window_size"),
        sync_start_block: r.get("sync_start_block"),
        updated_at: r.get("updated_at"),
    }
}

/// Read, mutate and upsert one cursor row inside an open transaction.
async fn read_modify_write(
    conn: &mut SqliteConnection,
    chain_id: u64,
    address: &str,
    mutator: CursorMutator,
) -> Result<CursorRecord, sqlx::Error> {
    let existing = sqlx::query(
        "SELECT state, last_read_block, window_size, sync_start_block, updated_at
         FROM cursors WHERE chain_id = ? AND address = ?",
    )
    .bind(chain_id as i64)
    .bind(address)
    .fetch_optional(&mut *conn)
    .await?
    .map(|r| cursor_from_row(&r));

    let next = mutator(existing);
    sqlx::query(
        "INSERT OR REPLACE INTO cursors
         (chain_id, address, state, last_read_block, window_size, sync_start_block, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(chain_id as i64)
    .bind(address)
    .bind(next.state)
    .bind(next.last_read_block)
    .bind(next.window_size)
    .bind(next.sync_start_block)
    .bind(next.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(next)
}

// ─── CursorStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl CursorStore for SqliteStorage {
    async fn read(&self, chain_id: u64, address: &str) -> Result<Option<CursorRecord>, SyncError> {
        let row = sqlx::query(
            "SELECT state, last_read_block, window_size, sync_start_block, updated_at
             FROM cursors WHERE chain_id = ? AND address = ?",
        )
        .bind(chain_id as i64)
        .bind(address.to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| cursor_from_row(&r)))
    }

    async fn write_atomic(
        &self,
        chain_id: u64,
        address: &str,
        mutator: CursorMutator,
    ) -> Result<CursorRecord, SyncError> {
        let address = address.to_ascii_lowercase();
        let mut conn = self.pool.acquire().await.map_err(storage_err)?;

        // IMMEDIATE takes the write lock up front so two writers cannot both
        // read the old row.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(storage_err)?;

        match read_modify_write(&mut *conn, chain_id, &address, mutator).await {
            Ok(next) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(storage_err)?;
                debug!(chain_id, address = %address, state = next.state, "cursor saved");
                Ok(next)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!(error = %rollback, "cursor rollback failed");
                }
                Err(storage_err(e))
            }
        }
    }
}

// ─── TransferProcessor / TxHashSink impls ────────────────────────────────────

#[async_trait]
impl TransferProcessor for SqliteStorage {
    async fn on_matched_logs(
        &self,
        ctx: &TransferContext,
        direction: TransferDirection,
        logs: &[RawLog],
    ) -> Result<ProcessedLogs, SyncError> {
        let mut inserted = 0usize;
        for log in logs.iter().filter(|l| !l.is_removed()) {
            if self.insert_transfer(&TransferRecord::from_log(ctx, direction, log)).await? {
                inserted += 1;
            }
        }
        debug!(
            chain_id = ctx.chain_id,
            contract = %ctx.contract_address,
            direction = %direction,
            matched = logs.len(),
            inserted,
            "transfers stored"
        );
        Ok(ProcessedLogs::from_logs(ctx.kind, logs))
    }
}

#[async_trait]
impl TxHashSink for SqliteStorage {
    async fn enqueue(&self, chain_id: u64, wallet: &str, tx_hash: &str) -> Result<(), SyncError> {
        sqlx::query(
            "INSERT OR IGNORE INTO tx_queue (chain_id, wallet, tx_hash, queued_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(chain_id as i64)
        .bind(wallet.to_ascii_lowercase())
        .bind(tx_hash.to_ascii_lowercase())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
