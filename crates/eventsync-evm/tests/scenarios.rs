//! End-to-end engine cycles against a scripted log client and in-memory storage.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use eventsync_core::{
    BatchCapability, BlockTag, CursorManager, HeadCache, SyncConfig, SyncCursor, SyncError,
    SyncState, SyncWindow,
};
use eventsync_core::handler::RawLog;
use eventsync_evm::{
    CycleOutcome, EventSync, EventSyncBuilder, JsonRpcError, LogClient, LogFilter, LogResult,
    TransportError,
};
use eventsync_storage::InMemoryStorage;

const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
const WALLET: &str = "0x00000000219ab540356cBB839Cbe05303d7705Fa";

// ─── Scripted client ──────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedClient {
    /// Batches come back one entry short.
    short_batches: bool,
    /// Every query fails at the HTTP layer.
    transport_down: bool,
    /// Returned once `responses` runs dry; empty logs when unset.
    fallback_error: Option<JsonRpcError>,
    responses: Mutex<VecDeque<LogResult>>,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
    ranges: Mutex<Vec<(BlockTag, BlockTag)>>,
}

impl ScriptedClient {
    fn with_responses(responses: Vec<LogResult>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn answer(&self, filter: &LogFilter) -> LogResult {
        self.ranges.lock().unwrap().push((filter.from_block, filter.to_block));
        match self.responses.lock().unwrap().pop_front() {
            Some(result) => result,
            None => match &self.fallback_error {
                Some(err) => Err(err.clone()),
                None => Ok(vec![]),
            },
        }
    }

    fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn ranges(&self) -> Vec<(BlockTag, BlockTag)> {
        self.ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogClient for ScriptedClient {
    async fn get_logs(&self, filter: &LogFilter) -> Result<LogResult, TransportError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport_down {
            return Err(TransportError::Http("connection refused".into()));
        }
        Ok(self.answer(filter))
    }

    async fn get_logs_batch(&self, filters: &[LogFilter]) -> Result<Vec<LogResult>, TransportError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport_down {
            return Err(TransportError::Http("connection refused".into()));
        }
        if self.short_batches {
            return Ok(vec![Ok(vec![])]);
        }
        Ok(filters.iter().map(|f| self.answer(f)).collect())
    }
}

// ─── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    engine: EventSync<ScriptedClient>,
    storage: Arc<InMemoryStorage>,
    heads: Arc<HeadCache>,
    batch: Arc<BatchCapability>,
}

impl Harness {
    fn new(chain_id: u64, head: u64, client: ScriptedClient) -> Self {
        Self::with_retries(chain_id, head, client, 4)
    }

    fn with_retries(chain_id: u64, head: u64, client: ScriptedClient, retries: u32) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let heads = Arc::new(HeadCache::new());
        heads.update(chain_id, head);
        let batch = Arc::new(BatchCapability::new());
        let engine = EventSyncBuilder::new(SyncConfig::new(chain_id, TOKEN, WALLET))
            .max_immediate_retries(retries)
            .cursor_store(storage.clone())
            .head_provider(heads.clone())
            .batch_capability(batch.clone())
            .processor(storage.clone())
            .sink(storage.clone())
            .build(client)
            .unwrap();
        Self {
            engine,
            storage,
            heads,
            batch,
        }
    }

    fn client(&self) -> &ScriptedClient {
        self.engine.fetcher().client()
    }

    async fn seed_cursor(&self, cursor: SyncCursor) {
        let chain_id = self.engine.config().chain_id;
        CursorManager::new(self.storage.clone(), chain_id, TOKEN)
            .update(move |_| cursor)
            .await
            .unwrap();
    }
}

fn transfer(tx_hash: &str, log_index: u64) -> RawLog {
    RawLog {
        address: TOKEN.to_ascii_lowercase(),
        topics: vec![],
        data: format!("0x{:064x}", 1_000_000u64),
        block_number: Some("0x7a120".into()),
        block_hash: None,
        tx_hash: tx_hash.into(),
        log_index: Some(format!("0x{log_index:x}")),
        removed: None,
    }
}

fn range_error() -> JsonRpcError {
    JsonRpcError::new(-32005, "query exceeds max block range 3000")
}

// ─── First window ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unlimited_chain_starts_with_full_downward_scan() {
    let h = Harness::new(1, 500_000, ScriptedClient::default());

    let window = h.engine.compute_next_window().await.unwrap().unwrap();
    assert_eq!(window.start_block, 1);
    assert_eq!(window.end_block, BlockTag::Latest);
    assert_eq!(window.state, SyncState::DownwardSyncStart);
    assert!(!window.upward);

    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::DownwardSyncStart);
    assert_eq!(cursor.sync_start_block, 500_000);
}

#[tokio::test]
async fn full_scan_commit_moves_to_upward_max() {
    let h = Harness::new(1, 500_000, ScriptedClient::default());

    let report = h.engine.sync_once().await.unwrap().unwrap();
    assert_eq!(report.window.end_block, BlockTag::Latest);

    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::UpwardSyncMax);
    assert_eq!(cursor.last_read_block, 500_000);
    assert_eq!(cursor.sync_start_block, 500_000);

    // next tick continues from the stored head
    h.heads.update(1, 500_020);
    let next = h.engine.compute_next_window().await.unwrap().unwrap();
    assert_eq!(next.start_block, 500_000);
    assert_eq!(next.end_block, BlockTag::Latest);
    assert_eq!(next.state, SyncState::UpwardSyncMax);
}

#[tokio::test]
async fn limited_chain_starts_three_ranges_behind_head() {
    let h = Harness::new(137, 100_000, ScriptedClient::default());

    let window = h.engine.compute_next_window().await.unwrap().unwrap();
    assert_eq!(window.start_block, 91_000);
    assert_eq!(window.end_block, BlockTag::Number(93_999));
    assert_eq!(window.state, SyncState::UpwardSync);
    assert!(window.upward);

    // no downward scan, so no sync start is recorded
    assert_eq!(h.engine.cursor().await.unwrap(), SyncCursor::initial());
}

#[tokio::test]
async fn unknown_head_skips_the_cycle() {
    let h = Harness::new(1, 0, ScriptedClient::default());
    assert!(h.engine.compute_next_window().await.unwrap().is_none());
    assert!(h.engine.sync_once().await.unwrap().is_none());
    assert_eq!(h.client().batch_calls() + h.client().single_calls(), 0);
}

// ─── Window sizing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_downward_window_quadruples() {
    let h = Harness::new(1, 500_000, ScriptedClient::default());
    h.seed_cursor(SyncCursor {
        state: SyncState::DownwardSync,
        last_read_block: 10_000,
        window_size: 1_000,
        sync_start_block: 500_000,
    })
    .await;

    let report = h.engine.sync_once().await.unwrap().unwrap();
    assert_eq!(report.window.start_block, 9_000);
    assert_eq!(report.window.end_block, BlockTag::Number(10_000));

    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::DownwardSync);
    assert_eq!(cursor.last_read_block, 9_000);
    assert_eq!(cursor.window_size, 4_000);
}

#[tokio::test]
async fn commit_is_idempotent() {
    let h = Harness::new(1, 500_000, ScriptedClient::default());
    h.seed_cursor(SyncCursor {
        state: SyncState::DownwardSync,
        last_read_block: 10_000,
        window_size: 1_000,
        sync_start_block: 500_000,
    })
    .await;

    let window = h.engine.compute_next_window().await.unwrap().unwrap();
    let first = h.engine.commit(&window, 12).await.unwrap();
    let second = h.engine.commit(&window, 12).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.window_size, 2_000);
}

// ─── Range-error recovery ─────────────────────────────────────────────────────

#[tokio::test]
async fn range_error_on_latest_window_narrows_to_max_range() {
    let client = ScriptedClient::with_responses(vec![Err(range_error()), Ok(vec![])]);
    let h = Harness::new(137, 100_000, client);

    let rejected = SyncWindow {
        start_block: 91_000,
        end_block: BlockTag::Latest,
        state: SyncState::UpwardSync,
        upward: true,
        chain_head: 100_000,
    };
    let outcome = h.engine.execute_cycle(&rejected).await.unwrap();
    let narrowed = match outcome {
        CycleOutcome::Narrowed(window) => window,
        other => panic!("expected a narrowed window, got {other:?}"),
    };
    assert_eq!(narrowed.start_block, 91_000);
    assert_eq!(narrowed.end_block, BlockTag::Number(94_000));
    assert_eq!(narrowed.state, SyncState::UpwardSync);

    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::UpwardSync);
    assert_eq!(cursor.last_read_block, 91_000);

    // the retried window starts at the same block, capped at the provider range
    let retry = h.engine.compute_next_window().await.unwrap().unwrap();
    assert_eq!(retry.start_block, 91_000);
    assert_eq!(retry.end_block, BlockTag::Number(93_999));
}

#[tokio::test]
async fn sync_once_retries_narrowed_window_immediately() {
    let client = ScriptedClient::with_responses(vec![Err(range_error()), Ok(vec![])]);
    let h = Harness::new(137, 100_000, client);

    let report = h.engine.sync_once().await.unwrap().unwrap();
    assert_eq!(report.window.start_block, 91_000);
    assert_eq!(report.window.end_block, BlockTag::Number(92_499));

    let ranges = h.client().ranges();
    assert_eq!(ranges.len(), 4);
    assert_eq!(ranges[0].1, BlockTag::Number(93_999));
    assert_eq!(ranges[2].1, BlockTag::Number(92_499));

    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::UpwardSync);
    assert_eq!(cursor.last_read_block, 92_499);
    assert_eq!(cursor.window_size, 3_000);
}

#[tokio::test]
async fn persistent_range_errors_defer_to_next_tick() {
    let client = ScriptedClient {
        fallback_error: Some(range_error()),
        ..ScriptedClient::default()
    };
    let h = Harness::with_retries(137, 100_000, client, 1);

    assert!(h.engine.sync_once().await.unwrap().is_none());
    assert_eq!(h.client().batch_calls(), 2);

    // progress made by narrowing is kept
    let cursor = h.engine.cursor().await.unwrap();
    assert_eq!(cursor.state, SyncState::UpwardSync);
    assert_eq!(cursor.last_read_block, 91_000);
    assert!(cursor.window_size < 3_000);
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn other_provider_errors_propagate_without_commit() {
    let client = ScriptedClient::with_responses(vec![
        Ok(vec![]),
        Err(JsonRpcError::new(-32000, "internal error")),
    ]);
    let h = Harness::new(137, 100_000, client);

    let err = h.engine.sync_once().await.unwrap_err();
    assert!(err.is_provider_error());
    assert!(matches!(err, SyncError::ProviderLog { code: -32000, .. }));
    assert_eq!(h.engine.cursor().await.unwrap(), SyncCursor::initial());
    assert_eq!(h.storage.transfer_count(), 0);
}

#[tokio::test]
async fn pruned_history_is_not_narrowed() {
    let client = ScriptedClient::with_responses(vec![
        Err(JsonRpcError::new(-32000, "missing trie node 4f2a (path ) at block 1")),
        Ok(vec![]),
    ]);
    let h = Harness::new(137, 100_000, client);

    let err = h.engine.sync_once().await.unwrap_err();
    assert!(matches!(err, SyncError::ProviderLog { code: -32000, .. }));
    assert_eq!(h.client().batch_calls(), 1);
    assert_eq!(h.engine.cursor().await.unwrap(), SyncCursor::initial());
}

#[tokio::test]
async fn transport_errors_propagate_without_commit() {
    let client = ScriptedClient {
        transport_down: true,
        ..ScriptedClient::default()
    };
    let h = Harness::new(137, 100_000, client);

    let err = h.engine.sync_once().await.unwrap_err();
    assert!(err.is_transport_error());
    assert_eq!(h.engine.cursor().await.unwrap(), SyncCursor::initial());
    // an HTTP failure says nothing about batch support
    assert!(!h.batch.is_unsupported(137));
}

// ─── Batch downgrade ──────────────────────────────────────────────────────────

#[tokio::test]
async fn short_batch_downgrades_chain_for_good() {
    let client = ScriptedClient {
        short_batches: true,
        ..ScriptedClient::default()
    };
    let h = Harness::new(137, 100_000, client);

    assert!(h.engine.sync_once().await.unwrap().is_some());
    assert!(h.batch.is_unsupported(137));
    assert_eq!(h.client().batch_calls(), 1);
    assert_eq!(h.client().single_calls(), 2);

    h.heads.update(137, 100_100);
    assert!(h.engine.sync_once().await.unwrap().is_some());
    assert_eq!(h.client().batch_calls(), 1);
    assert_eq!(h.client().single_calls(), 4);
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matched_logs_are_stored_and_hashes_queued() {
    let client = ScriptedClient::with_responses(vec![
        Ok(vec![transfer("0xAA", 0), transfer("0xbb", 3)]),
        Ok(vec![transfer("0xaa", 1)]),
    ]);
    let h = Harness::new(1, 500_000, client);

    let report = h.engine.sync_once().await.unwrap().unwrap();
    assert_eq!(report.received, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(report.event_count, 2);
    assert_eq!(report.tx_hashes.len(), 2);
    assert!(report.tx_hashes.contains("0xaa"));

    assert_eq!(h.storage.transfer_count(), 3);
    let queued = h.storage.queued();
    assert_eq!(queued.len(), 2);
    assert!(queued
        .iter()
        .all(|q| q.chain_id == 1 && q.wallet == WALLET.to_ascii_lowercase()));

    let stored = h.storage.transfers_for(1, TOKEN);
    assert_eq!(stored[0].block_number, Some(500_000));
    assert_eq!(stored[1].log_index, 3);
}

#[tokio::test]
async fn reset_starts_over() {
    let h = Harness::new(1, 500_000, ScriptedClient::default());
    h.engine.sync_once().await.unwrap();
    assert_eq!(h.engine.cursor().await.unwrap().state, SyncState::UpwardSyncMax);

    h.engine.reset().await.unwrap();
    let window = h.engine.compute_next_window().await.unwrap().unwrap();
    assert_eq!(window.state, SyncState::DownwardSyncStart);
}
