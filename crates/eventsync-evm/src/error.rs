//! Transport-level error types.

use thiserror::Error;

use eventsync_core::error::SyncError;

use crate::rpc::JsonRpcError;

/// Errors that can occur talking to a JSON-RPC node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, timeout, non-2xx status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// A batch came back with the wrong number of responses or unmatched ids.
    #[error("batch response shape mismatch: expected {expected}, got {got}")]
    BatchShape { expected: usize, got: usize },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if a batched call failed in a way that sequential calls
    /// may not.
    pub fn is_batch_incompatible(&self) -> bool {
        matches!(self, Self::BatchShape { .. } | Self::Deserialization(_))
    }
}

impl From<TransportError> for SyncError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Rpc(err) => SyncError::ProviderLog {
                code: err.code,
                message: err.message,
            },
            other => SyncError::Transport(other.to_string()),
        }
    }
}
