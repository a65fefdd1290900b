//! The `RpcTransport` trait and its reqwest-backed HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse};

/// Moves JSON-RPC envelopes to a node and back.
///
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send several requests in one round trip. Responses may come back in
    /// any order; callers match them by id.
    async fn send_batch(&self, reqs: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, TransportError>;

    /// Endpoint identifier for logs.
    fn url(&self) -> &str;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP JSON-RPC transport.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { url: url.into(), http })
    }

    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpTransportConfig::default())
    }

    async fn post<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        // decode separately so a non-JSON body reads as a decoding failure
        let text = resp.text().await.map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, id = req.id, url = %self.url, "rpc request");
        let body = self.post(&req).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn send_batch(&self, reqs: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let expected = reqs.len();
        tracing::trace!(size = expected, url = %self.url, "rpc batch request");

        match self.post(&reqs).await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(TransportError::from))
                .collect(),
            // Nodes without batch support answer with a single error object.
            _ => Err(TransportError::BatchShape { expected, got: 0 }),
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}
