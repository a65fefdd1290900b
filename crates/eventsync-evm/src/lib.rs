//! eventsync-evm — JSON-RPC log fetching and the `EventSync` orchestrator.

pub mod builder;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod rpc;
pub mod sync;
pub mod transport;

pub use builder::EventSyncBuilder;
pub use client::{LogClient, LogResult, RpcLogClient};
pub use error::TransportError;
pub use fetcher::{FetchedLogs, LogFetcher};
pub use filter::{LogFilter, TransferFilters};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use sync::{CycleOutcome, CycleReport, EventSync};
pub use transport::{HttpTransport, HttpTransportConfig, RpcTransport};
