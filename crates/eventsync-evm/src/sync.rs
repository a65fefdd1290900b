//! The per-token sync orchestrator.
//!
//! # Cycle
//! 1. Read the chain head and the stored cursor, compute the next window.
//! 2. Fetch received and sent transfer logs for the window.
//! 3. On a block-range rejection, store a narrower window and retry.
//! 4. Hand matched logs to the transfer processor, queue every tx hash.
//! 5. Commit the cursor for the completed window.

use std::collections::BTreeSet;
use std::sync::Arc;

use eventsync_core::config::SyncConfig;
use eventsync_core::cursor::{CursorManager, SyncCursor};
use eventsync_core::error::SyncError;
use eventsync_core::handler::{TransferContext, TransferProcessor, TxHashSink};
use eventsync_core::head::ChainHeadProvider;
use eventsync_core::limits::RangeLimits;
use eventsync_core::recovery::{is_range_error, narrow_window, narrowed_cursor};
use eventsync_core::state::{committed_cursor, plan_window};
use eventsync_core::types::{SyncState, SyncWindow, TransferDirection};

use crate::client::{LogClient, LogResult};
use crate::fetcher::LogFetcher;
use crate::filter::TransferFilters;
use crate::rpc::JsonRpcError;

/// What one completed window produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub window: SyncWindow,
    pub received: usize,
    pub sent: usize,
    /// Larger of the two directions; drives window sizing.
    pub event_count: usize,
    pub received_token_ids: BTreeSet<String>,
    pub sent_token_ids: BTreeSet<String>,
    /// Distinct tx hashes across both directions.
    pub tx_hashes: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// The provider rejected the range; a narrower window was stored and the
    /// cycle should be retried right away.
    Narrowed(SyncWindow),
}

/// Sync engine bound to one `(chain_id, contract_address)` pair.
pub struct EventSync<C> {
    config: SyncConfig,
    cursor: CursorManager,
    fetcher: LogFetcher<C>,
    heads: Arc<dyn ChainHeadProvider>,
    limits: Arc<dyn RangeLimits>,
    processor: Arc<dyn TransferProcessor>,
    sink: Arc<dyn TxHashSink>,
    context: TransferContext,
}

impl<C: LogClient> EventSync<C> {
    pub(crate) fn new(
        config: SyncConfig,
        cursor: CursorManager,
        fetcher: LogFetcher<C>,
        heads: Arc<dyn ChainHeadProvider>,
        limits: Arc<dyn RangeLimits>,
        processor: Arc<dyn TransferProcessor>,
        sink: Arc<dyn TxHashSink>,
    ) -> Self {
        let context = TransferContext {
            chain_id: config.chain_id,
            contract_address: config.contract_address.clone(),
            wallet_address: config.wallet_address.clone(),
            kind: config.transfer_kind,
        };
        Self {
            config,
            cursor,
            fetcher,
            heads,
            limits,
            processor,
            sink,
            context,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &LogFetcher<C> {
        &self.fetcher
    }

    /// The stored cursor (created on first access).
    pub async fn cursor(&self) -> Result<SyncCursor, SyncError> {
        self.cursor.load().await
    }

    /// Next window to scan, or `None` while the chain head is unknown.
    pub async fn compute_next_window(&self) -> Result<Option<SyncWindow>, SyncError> {
        let chain_id = self.config.chain_id;
        let head = self.heads.current_block_height(chain_id).await?;
        let cursor = self.cursor.load().await?;
        let limit = self.limits.range_limit(chain_id);

        let Some(plan) = plan_window(&cursor, head, limit) else {
            tracing::debug!(chain_id, "chain head unknown, skipping cycle");
            return Ok(None);
        };
        if let Some(start) = plan.sync_start {
            if cursor.sync_start_block != start {
                self.cursor.record_sync_start(start).await?;
            }
        }
        if cursor.state == SyncState::UpwardSyncMax && plan.window.state == SyncState::UpwardSync {
            tracing::warn!(
                chain_id,
                address = %self.config.contract_address,
                last_read = cursor.last_read_block,
                head,
                "fell behind the provider range limit, resuming bounded upward scan"
            );
        }
        tracing::debug!(
            chain_id,
            address = %self.config.contract_address,
            window = %plan.window,
            "computed window"
        );
        Ok(Some(plan.window))
    }

    /// Fetch and process one window. Does not commit.
    pub async fn execute_cycle(&self, window: &SyncWindow) -> Result<CycleOutcome, SyncError> {
        let chain_id = self.config.chain_id;
        let filters = TransferFilters::for_window(
            self.config.transfer_kind,
            &self.config.contract_address,
            &self.config.wallet_address,
            window,
        );
        let fetched = self.fetcher.fetch(chain_id, &filters).await?;

        let (received, sent) = match (fetched.received, fetched.sent) {
            (Ok(r), Ok(s)) => (r, s),
            (r, s) => {
                let err = first_error(r, s);
                return self.on_provider_error(window, err).await;
            }
        };

        let recv = self
            .processor
            .on_matched_logs(&self.context, TransferDirection::Received, &received)
            .await?;
        let sent_out = self
            .processor
            .on_matched_logs(&self.context, TransferDirection::Sent, &sent)
            .await?;

        let tx_hashes: BTreeSet<String> = recv.tx_hashes.union(&sent_out.tx_hashes).cloned().collect();
        for hash in &tx_hashes {
            self.sink
                .enqueue(chain_id, &self.config.wallet_address, hash)
                .await?;
        }

        let report = CycleReport {
            window: *window,
            received: received.len(),
            sent: sent.len(),
            event_count: received.len().max(sent.len()),
            received_token_ids: recv.token_ids,
            sent_token_ids: sent_out.token_ids,
            tx_hashes,
        };
        tracing::debug!(
            chain_id,
            window = %window,
            received = report.received,
            sent = report.sent,
            tx_count = report.tx_hashes.len(),
            "window processed"
        );
        Ok(CycleOutcome::Completed(report))
    }

    async fn on_provider_error(&self, window: &SyncWindow, err: JsonRpcError) -> Result<CycleOutcome, SyncError> {
        if !is_range_error(&err.message) {
            return Err(SyncError::ProviderLog {
                code: err.code,
                message: err.message,
            });
        }
        let max_range = self.limits.max_range(self.config.chain_id);
        let narrowed = narrow_window(window, max_range);
        self.cursor
            .update(move |prev| narrowed_cursor(&prev, &narrowed))
            .await?;
        tracing::warn!(
            chain_id = self.config.chain_id,
            address = %self.config.contract_address,
            rejected = %window,
            narrowed = %narrowed,
            error = %err.message,
            "provider rejected block range, narrowing window"
        );
        Ok(CycleOutcome::Narrowed(narrowed))
    }

    /// Persist the cursor for a completed window.
    pub async fn commit(&self, window: &SyncWindow, events_returned: usize) -> Result<SyncCursor, SyncError> {
        let limit = self.limits.range_limit(self.config.chain_id);
        let window = *window;
        let before = self.cursor.load().await?.state;
        let cursor = self
            .cursor
            .update(move |prev| committed_cursor(&prev, &window, events_returned, limit))
            .await?;
        if cursor.state != before {
            tracing::info!(
                chain_id = self.config.chain_id,
                address = %self.config.contract_address,
                from = %before,
                to = %cursor.state,
                last_read = cursor.last_read_block,
                "sync phase changed"
            );
        }
        Ok(cursor)
    }

    /// Forget all progress; the next cycle starts a full rescan.
    pub async fn reset(&self) -> Result<SyncCursor, SyncError> {
        tracing::info!(
            chain_id = self.config.chain_id,
            address = %self.config.contract_address,
            "resetting sync cursor"
        );
        self.cursor.reset().await
    }

    /// Run one full cycle: compute, fetch, retry narrowed windows, commit.
    ///
    /// Returns `None` when the head is unknown or the provider kept rejecting
    /// the range for `max_immediate_retries` attempts.
    pub async fn sync_once(&self) -> Result<Option<CycleReport>, SyncError> {
        let mut retries = 0;
        loop {
            let Some(window) = self.compute_next_window().await? else {
                return Ok(None);
            };
            match self.execute_cycle(&window).await? {
                CycleOutcome::Completed(report) => {
                    self.commit(&window, report.event_count).await?;
                    return Ok(Some(report));
                }
                CycleOutcome::Narrowed(_) if retries < self.config.max_immediate_retries => retries += 1,
                CycleOutcome::Narrowed(narrowed) => {
                    tracing::warn!(
                        chain_id = self.config.chain_id,
                        retries,
                        window = %narrowed,
                        "range still rejected, deferring to next tick"
                    );
                    return Ok(None);
                }
            }
        }
    }
}

fn first_error(received: LogResult, sent: LogResult) -> JsonRpcError {
    // prefer a range error so it gets recovered rather than surfaced
    let errors: Vec<JsonRpcError> = [received.err(), sent.err()].into_iter().flatten().collect();
    let pick = errors
        .iter()
        .position(|e| is_range_error(&e.message))
        .unwrap_or(0);
    errors
        .into_iter()
        .nth(pick)
        .unwrap_or_else(|| JsonRpcError::new(-32603, "log query failed"))
}
