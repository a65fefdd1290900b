//! Fetches both transfer directions for a window.
//!
//! One batched call is tried first; if the provider cannot honor it the chain
//! is marked in the shared [`BatchCapability`] and every later fetch for that
//! chain goes straight to two sequential calls.

use std::sync::Arc;

use eventsync_core::batch::BatchCapability;
use eventsync_core::limits::RangeLimits;

use crate::client::{LogClient, LogResult};
use crate::error::TransportError;
use crate::filter::TransferFilters;

/// Per-direction results of one fetch.
#[derive(Debug)]
pub struct FetchedLogs {
    pub received: LogResult,
    pub sent: LogResult,
}

pub struct LogFetcher<C> {
    client: C,
    batch: Arc<BatchCapability>,
    limits: Arc<dyn RangeLimits>,
}

impl<C: LogClient> LogFetcher<C> {
    pub fn new(client: C, batch: Arc<BatchCapability>, limits: Arc<dyn RangeLimits>) -> Self {
        Self { client, batch, limits }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run both filters. Node errors come back inside [`FetchedLogs`];
    /// only transport failures are returned as `Err`.
    pub async fn fetch(&self, chain_id: u64, filters: &TransferFilters) -> Result<FetchedLogs, TransportError> {
        if self.limits.batch_enabled(chain_id) && !self.batch.is_unsupported(chain_id) {
            let batch = [filters.received.clone(), filters.sent.clone()];
            let err = match self.client.get_logs_batch(&batch).await {
                Ok(results) if results.len() == 2 => {
                    let mut results = results.into_iter();
                    if let (Some(received), Some(sent)) = (results.next(), results.next()) {
                        return Ok(FetchedLogs { received, sent });
                    }
                    TransportError::BatchShape { expected: 2, got: 0 }
                }
                Ok(results) => TransportError::BatchShape {
                    expected: 2,
                    got: results.len(),
                },
                Err(e) if e.is_batch_incompatible() => e,
                Err(e) => return Err(e),
            };
            if self.batch.mark_unsupported(chain_id) {
                tracing::warn!(
                    chain_id,
                    error = %err,
                    "batched log query failed, using sequential queries for this chain"
                );
            }
        }

        let received = self.client.get_logs(&filters.received).await?;
        let sent = self.client.get_logs(&filters.sent).await?;
        Ok(FetchedLogs { received, sent })
    }
}
