//! In-memory storage backend.
//!
//! Holds cursors, matched transfers and the tx-hash queue in RAM.
//! Useful for testing and short-lived engines that don't need persistence.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use eventsync_core::cursor::{CursorMutator, CursorRecord, CursorStore, MemoryCursorStore};
use eventsync_core::error::SyncError;
use eventsync_core::handler::{ProcessedLogs, RawLog, TransferContext, TransferProcessor, TxHashSink};
use eventsync_core::types::TransferDirection;

use crate::transfer::TransferRecord;

/// A queued transaction fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueuedTx {
    pub chain_id: u64,
    pub wallet: String,
    pub tx_hash: String,
}

/// In-memory engine storage. All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStorage {
    cursors: MemoryCursorStore,
    transfers: Mutex<Vec<TransferRecord>>,
    queue: Mutex<Vec<QueuedTx>>,
}

fn poisoned<T>(_: T) -> SyncError {
    SyncError::Storage("in-memory storage lock poisoned".into())
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored transfers for one token contract, in insertion order.
    pub fn transfers_for(&self, chain_id: u64, contract: &str) -> Vec<TransferRecord> {
        let contract = contract.to_ascii_lowercase();
        self.transfers
            .lock()
            .map(|t| {
                t.iter()
                    .filter(|r| r.chain_id == chain_id && r.contract_address == contract)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Everything queued so far, in enqueue order.
    pub fn queued(&self) -> Vec<QueuedTx> {
        self.queue.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CursorStore for InMemoryStorage {
    async fn read(&self, chain_id: u64, address: &str) -> Result<Option<CursorRecord>, SyncError> {
        self.cursors.read(chain_id, address).await
    }

    async fn write_atomic(
        &self,
        chain_id: u64,
        address: &str,
        mutator: CursorMutator,
    ) -> Result<CursorRecord, SyncError> {
        self.cursors.write_atomic(chain_id, address, mutator).await
    }
}

#[async_trait]
impl TransferProcessor for InMemoryStorage {
    async fn on_matched_logs(
        &self,
        ctx: &TransferContext,
        direction: TransferDirection,
        logs: &[RawLog],
    ) -> Result<ProcessedLogs, SyncError> {
        let mut transfers = self.transfers.lock().map_err(poisoned)?;
        let mut seen: HashSet<_> = transfers.iter().map(TransferRecord::key).collect();
        for log in logs.iter().filter(|l| !l.is_removed()) {
            let record = TransferRecord::from_log(ctx, direction, log);
            if seen.insert(record.key()) {
                transfers.push(record);
            }
        }
        Ok(ProcessedLogs::from_logs(ctx.kind, logs))
    }
}

#[async_trait]
impl TxHashSink for InMemoryStorage {
    async fn enqueue(&self, chain_id: u64, wallet: &str, tx_hash: &str) -> Result<(), SyncError> {
        let item = QueuedTx {
            chain_id,
            wallet: wallet.to_ascii_lowercase(),
            tx_hash: tx_hash.to_ascii_lowercase(),
        };
        let mut queue = self.queue.lock().map_err(poisoned)?;
        if !queue.contains(&item) {
            queue.push(item);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_core::cursor::{CursorManager, SyncCursor};
    use eventsync_core::types::{SyncState, TransferKind};
    use std::sync::Arc;

    fn ctx() -> TransferContext {
        TransferContext {
            chain_id: 1,
            contract_address: "0xtoken".into(),
            wallet_address: "0xwallet".into(),
            kind: TransferKind::Erc721,
        }
    }

    fn log(tx: &str, index: &str) -> RawLog {
        RawLog {
            address: "0xtoken".into(),
            topics: vec!["0xt".into(), "0xa".into(), "0xb".into(), format!("0x{:064x}", 5)],
            data: "0x".into(),
            block_number: Some("0x64".into()),
            block_hash: None,
            tx_hash: tx.into(),
            log_index: Some(index.into()),
            removed: None,
        }
    }

    #[tokio::test]
    async fn cursor_store_roundtrip() {
        let storage = Arc::new(InMemoryStorage::new());
        let mgr = CursorManager::new(storage.clone(), 1, "0xToken");
        let written = mgr
            .update(|_| SyncCursor {
                state: SyncState::UpwardSync,
                last_read_block: 10,
                window_size: 20,
                sync_start_block: 30,
            })
            .await
            .unwrap();
        assert_eq!(mgr.load().await.unwrap(), written);
        assert!(storage.read(1, "0xtoken").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn processor_stores_and_dedups() {
        let storage = InMemoryStorage::new();
        let logs = vec![log("0xAA", "0x0"), log("0xbb", "0x1")];

        let out = storage
            .on_matched_logs(&ctx(), TransferDirection::Received, &logs)
            .await
            .unwrap();
        assert_eq!(out.tx_hashes.len(), 2);
        assert!(out.token_ids.contains("0x5"));

        // same window again
        storage
            .on_matched_logs(&ctx(), TransferDirection::Received, &logs)
            .await
            .unwrap();
        assert_eq!(storage.transfer_count(), 2);

        let stored = storage.transfers_for(1, "0xTOKEN");
        assert_eq!(stored[0].tx_hash, "0xaa");
        assert_eq!(stored[0].block_number, Some(100));
        assert_eq!(stored[1].log_index, 1);
    }

    #[tokio::test]
    async fn sink_dedups_hashes() {
        let storage = InMemoryStorage::new();
        storage.enqueue(1, "0xW", "0xAA").await.unwrap();
        storage.enqueue(1, "0xw", "0xaa").await.unwrap();
        storage.enqueue(137, "0xw", "0xaa").await.unwrap();
        assert_eq!(storage.queued().len(), 2);
    }
}
