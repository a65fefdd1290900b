//! Fluent builder API for creating sync engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eventsync_core::{HeadCache, SyncConfig, TransferKind};
//! use eventsync_evm::{EventSyncBuilder, HttpTransport, RpcLogClient};
//! # use eventsync_core::{TransferProcessor, TxHashSink};
//! # fn collaborators() -> (Arc<dyn TransferProcessor>, Arc<dyn TxHashSink>) { unimplemented!() }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (processor, sink) = collaborators();
//! let client = RpcLogClient::new(HttpTransport::default_for("https://polygon-rpc.com")?);
//! let engine = EventSyncBuilder::new(SyncConfig::new(
//!         137,
//!         "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174",
//!         "0x00000000219ab540356cBB839Cbe05303d7705Fa",
//!     ))
//!     .transfer_kind(TransferKind::Erc20)
//!     .head_provider(Arc::new(HeadCache::new()))
//!     .processor(processor)
//!     .sink(sink)
//!     .build(client)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use eventsync_core::batch::BatchCapability;
use eventsync_core::config::SyncConfig;
use eventsync_core::cursor::{CursorManager, CursorStore, MemoryCursorStore};
use eventsync_core::error::SyncError;
use eventsync_core::handler::{TransferProcessor, TxHashSink};
use eventsync_core::head::ChainHeadProvider;
use eventsync_core::limits::{ChainLimitRegistry, RangeLimits};
use eventsync_core::types::TransferKind;

use crate::client::LogClient;
use crate::fetcher::LogFetcher;
use crate::sync::EventSync;

/// Fluent builder for [`EventSync`].
///
/// Cursor store, limits and batch capability default to in-memory / built-in
/// values. Head provider, processor and sink are required.
pub struct EventSyncBuilder {
    config: SyncConfig,
    store: Option<Arc<dyn CursorStore>>,
    heads: Option<Arc<dyn ChainHeadProvider>>,
    limits: Option<Arc<dyn RangeLimits>>,
    batch: Option<Arc<BatchCapability>>,
    processor: Option<Arc<dyn TransferProcessor>>,
    sink: Option<Arc<dyn TxHashSink>>,
}

impl EventSyncBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            store: None,
            heads: None,
            limits: None,
            batch: None,
            processor: None,
            sink: None,
        }
    }

    pub fn transfer_kind(mut self, kind: TransferKind) -> Self {
        self.config.transfer_kind = kind;
        self
    }

    /// Set how many narrowed retries `sync_once` may run back to back.
    pub fn max_immediate_retries(mut self, n: u32) -> Self {
        self.config.max_immediate_retries = n;
        self
    }

    pub fn cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn head_provider(mut self, heads: Arc<dyn ChainHeadProvider>) -> Self {
        self.heads = Some(heads);
        self
    }

    pub fn limits(mut self, limits: Arc<dyn RangeLimits>) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Share a batch capability set with other engines of the process.
    pub fn batch_capability(mut self, batch: Arc<BatchCapability>) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn TransferProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn TxHashSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the engine around `client`.
    pub fn build<C: LogClient>(self, client: C) -> Result<EventSync<C>, SyncError> {
        let config = self.config.normalized()?;
        let heads = self
            .heads
            .ok_or_else(|| SyncError::Config("a chain head provider is required".into()))?;
        let processor = self
            .processor
            .ok_or_else(|| SyncError::Config("a transfer processor is required".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| SyncError::Config("a tx hash sink is required".into()))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCursorStore::new()));
        let limits = self
            .limits
            .unwrap_or_else(|| Arc::new(ChainLimitRegistry::new()));
        let batch = self.batch.unwrap_or_default();

        let cursor = CursorManager::new(store, config.chain_id, &config.contract_address);
        let fetcher = LogFetcher::new(client, batch, limits.clone());
        Ok(EventSync::new(config, cursor, fetcher, heads, limits, processor, sink))
    }
}
