//! Sync cursor persistence.
//!
//! A cursor stores how far the scan for one `(chain_id, contract_address)`
//! pair has progressed. On restart the engine resumes from the stored cursor
//! rather than rescanning from scratch.
//!
//! The storage engine only ever sees [`CursorRecord`] rows and applies
//! read-modify-write mutators atomically. Validation (and re-initialisation
//! of corrupt rows) happens in [`CursorManager`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::types::SyncState;

// ─── SyncCursor ───────────────────────────────────────────────────────────────

/// Validated scan position for one (chain, contract) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub state: SyncState,
    /// Lowest block covered while scanning down; resume point while scanning up.
    pub last_read_block: u64,
    pub window_size: u64,
    /// Chain head when the first downward scan began.
    pub sync_start_block: u64,
}

impl SyncCursor {
    /// The cursor of a pair that has never been scanned.
    pub fn initial() -> Self {
        Self {
            state: SyncState::DownwardSyncStart,
            last_read_block: 0,
            window_size: 0,
            sync_start_block: 0,
        }
    }

    /// Decode a stored row. `None` if the state ordinal or any block field is
    /// out of range.
    pub fn from_record(record: &CursorRecord) -> Option<Self> {
        Some(Self {
            state: SyncState::from_ordinal(record.state)?,
            last_read_block: u64::try_from(record.last_read_block).ok()?,
            window_size: u64::try_from(record.window_size).ok()?,
            sync_start_block: u64::try_from(record.sync_start_block).ok()?,
        })
    }

    pub fn to_record(&self, updated_at: i64) -> CursorRecord {
        CursorRecord {
            state: self.state.ordinal(),
            last_read_block: clamp_i64(self.last_read_block),
            window_size: clamp_i64(self.window_size),
            sync_start_block: clamp_i64(self.sync_start_block),
            updated_at,
        }
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::initial()
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

// ─── CursorRecord / CursorStore ───────────────────────────────────────────────

/// Raw cursor row as held by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    /// `SyncState` ordinal.
    pub state: i64,
    pub last_read_block: i64,
    pub window_size: i64,
    pub sync_start_block: i64,
    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

/// Read-modify-write step applied by [`CursorStore::write_atomic`].
pub type CursorMutator = Box<dyn FnOnce(Option<CursorRecord>) -> CursorRecord + Send>;

/// Durable cursor storage keyed by `(chain_id, contract_address)`.
///
/// Implementations include [`MemoryCursorStore`] and the in-memory / SQLite
/// backends of `eventsync-storage`.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the stored row, if any.
    async fn read(&self, chain_id: u64, address: &str) -> Result<Option<CursorRecord>, SyncError>;

    /// Apply `mutator` to the stored row (or `None`) and persist its result
    /// in one atomic transaction. Returns the row that was written.
    async fn write_atomic(
        &self,
        chain_id: u64,
        address: &str,
        mutator: CursorMutator,
    ) -> Result<CursorRecord, SyncError>;
}

// ─── CursorManager ────────────────────────────────────────────────────────────

/// Cursor access for one (chain, contract) pair.
pub struct CursorManager {
    store: Arc<dyn CursorStore>,
    chain_id: u64,
    address: String,
}

impl CursorManager {
    pub fn new(store: Arc<dyn CursorStore>, chain_id: u64, address: impl AsRef<str>) -> Self {
        Self {
            store,
            chain_id,
            address: address.as_ref().to_ascii_lowercase(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Load the cursor, creating it on first access.
    ///
    /// A corrupt row is treated as absent and re-initialised.
    pub async fn load(&self) -> Result<SyncCursor, SyncError> {
        match self.store.read(self.chain_id, &self.address).await? {
            Some(record) => match SyncCursor::from_record(&record) {
                Some(cursor) => Ok(cursor),
                None => {
                    warn!(
                        chain_id = self.chain_id,
                        address = %self.address,
                        state = record.state,
                        "corrupt sync cursor, restarting scan"
                    );
                    self.update(|_| SyncCursor::initial()).await
                }
            },
            None => self.update(|_| SyncCursor::initial()).await,
        }
    }

    /// Atomically replace the cursor with `f(current)`.
    ///
    /// `current` is the validated stored cursor, or [`SyncCursor::initial`]
    /// when the row is missing or corrupt.
    pub async fn update<F>(&self, f: F) -> Result<SyncCursor, SyncError>
    where
        F: FnOnce(SyncCursor) -> SyncCursor + Send + 'static,
    {
        let mutator: CursorMutator = Box::new(move |existing| {
            let current = existing
                .as_ref()
                .and_then(SyncCursor::from_record)
                .unwrap_or_else(SyncCursor::initial);
            f(current).to_record(chrono::Utc::now().timestamp())
        });
        let written = self
            .store
            .write_atomic(self.chain_id, &self.address, mutator)
            .await?;
        let cursor = SyncCursor::from_record(&written)
            .ok_or_else(|| SyncError::Storage("store returned an invalid cursor".into()))?;
        debug!(
            chain_id = self.chain_id,
            address = %self.address,
            state = %cursor.state,
            last_read = cursor.last_read_block,
            window_size = cursor.window_size,
            "cursor written"
        );
        Ok(cursor)
    }

    /// Persist the chain head at which the downward sweep began.
    pub async fn record_sync_start(&self, block: u64) -> Result<SyncCursor, SyncError> {
        self.update(move |c| SyncCursor {
            sync_start_block: block,
            ..c
        })
        .await
    }

    /// Re-initialise the cursor so the next cycle starts a full rescan.
    pub async fn reset(&self) -> Result<SyncCursor, SyncError> {
        self.update(|_| SyncCursor::initial()).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory cursor store for tests and ephemeral engines.
#[derive(Default)]
pub struct MemoryCursorStore {
    data: Mutex<HashMap<(u64, String), CursorRecord>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a row directly, bypassing validation.
    pub fn insert_raw(&self, chain_id: u64, address: &str, record: CursorRecord) -> Result<(), SyncError> {
        self.data
            .lock()
            .map_err(|_| SyncError::Storage("cursor map poisoned".into()))?
            .insert((chain_id, address.to_ascii_lowercase()), record);
        Ok(())
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn read(&self, chain_id: u64, address: &str) -> Result<Option<CursorRecord>, SyncError> {
        let data = self
            .data
            .lock()
            .map_err(|_| SyncError::Storage("cursor map poisoned".into()))?;
        Ok(data.get(&(chain_id, address.to_ascii_lowercase())).copied())
    }

    async fn write_atomic(
        &self,
        chain_id: u64,
        address: &str,
        mutator: CursorMutator,
    ) -> Result<CursorRecord, SyncError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| SyncError::Storage("cursor map poisoned".into()))?;
        let key = (chain_id, address.to_ascii_lowercase());
        let next = mutator(data.get(&key).copied());
        data.insert(key, next);
        Ok(next)
    }
}
