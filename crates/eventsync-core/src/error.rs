//! Error types for the event sync engine.

use thiserror::Error;

/// Errors surfaced by a sync cycle.
///
/// Range-limit errors and batch incompatibilities are recovered inside the
/// engine and never show up here.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The node rejected a log query for a reason other than the block range.
    #[error("provider log error {code}: {message}")]
    ProviderLog { code: i64, message: String },

    /// Network or IO failure talking to the node.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The downstream transfer processor failed.
    #[error("transfer processor failed: {reason}")]
    Processor { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Returns `true` if the node itself reported the failure.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderLog { .. })
    }

    /// Returns `true` for network-level failures (retry on the next tick).
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
