//! Log-query client on top of a JSON-RPC transport.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use eventsync_core::handler::{parse_hex_u64, RawLog};

use crate::error::TransportError;
use crate::filter::LogFilter;
use crate::rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Outcome of one log query: the logs, or the error the node reported for it.
///
/// Node errors stay per-query so a batch can carry one failure next to one
/// success.
pub type LogResult = Result<Vec<RawLog>, JsonRpcError>;

/// Remote log-query client.
#[async_trait]
pub trait LogClient: Send + Sync {
    async fn get_logs(&self, filter: &LogFilter) -> Result<LogResult, TransportError>;

    /// Run all `filters` in one round trip. The results line up with
    /// `filters`.
    async fn get_logs_batch(&self, filters: &[LogFilter]) -> Result<Vec<LogResult>, TransportError>;
}

/// [`LogClient`] speaking `eth_getLogs` over any [`RpcTransport`].
pub struct RpcLogClient<T> {
    transport: T,
    next_id: AtomicU64,
}

impl<T: RpcTransport> RpcLogClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&self, method: &str, params: Vec<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params)
    }

    /// Current head via `eth_blockNumber`.
    pub async fn block_number(&self) -> Result<u64, TransportError> {
        let resp = self.transport.send(self.request("eth_blockNumber", vec![])).await?;
        let value = resp.into_result().map_err(TransportError::Rpc)?;
        let hex: String = serde_json::from_value(value)?;
        parse_hex_u64(&hex).ok_or_else(|| TransportError::Other(format!("invalid block number: {hex}")))
    }
}

fn decode_logs(resp: JsonRpcResponse) -> Result<LogResult, TransportError> {
    match resp.into_result() {
        Ok(Value::Null) => Err(TransportError::Other("null eth_getLogs result".into())),
        Ok(value) => Ok(Ok(serde_json::from_value(value)?)),
        Err(err) => Ok(Err(err)),
    }
}

#[async_trait]
impl<T: RpcTransport> LogClient for RpcLogClient<T> {
    async fn get_logs(&self, filter: &LogFilter) -> Result<LogResult, TransportError> {
        let req = self.request("eth_getLogs", vec![filter.to_param()]);
        let resp = self.transport.send(req).await?;
        decode_logs(resp)
    }

    async fn get_logs_batch(&self, filters: &[LogFilter]) -> Result<Vec<LogResult>, TransportError> {
        let reqs: Vec<_> = filters
            .iter()
            .map(|f| self.request("eth_getLogs", vec![f.to_param()]))
            .collect();
        let ids: Vec<u64> = reqs.iter().map(|r| r.id).collect();

        let mut responses = self.transport.send_batch(reqs).await?;
        if responses.len() != ids.len() {
            return Err(TransportError::BatchShape {
                expected: ids.len(),
                got: responses.len(),
            });
        }

        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            let pos = responses
                .iter()
                .position(|r| r.id == Some(*id))
                .ok_or(TransportError::BatchShape {
                    expected: ids.len(),
                    got: out.len(),
                })?;
            let resp = responses.swap_remove(pos);
            // a null entry means the node dropped this query from the batch
            if resp.error.is_none() && matches!(resp.result, None | Some(Value::Null)) {
                return Err(TransportError::BatchShape {
                    expected: ids.len(),
                    got: out.len(),
                });
            }
            out.push(decode_logs(resp)?);
        }
        Ok(out)
    }
}
