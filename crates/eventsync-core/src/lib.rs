//! eventsync-core — the chain-agnostic half of the token transfer log sync engine.
//!
//! # Architecture
//!
//! ```text
//! EventSync (eventsync-evm)
//!     ├── state::plan_window       (cursor + head + range limit → next window)
//!     ├── LogFetcher               (batched / sequential eth_getLogs)
//!     ├── recovery::narrow_window  (range-limit errors → narrower window)
//!     ├── state::committed_cursor  (window + event count → next cursor)
//!     ├── CursorManager            (atomic cursor persistence)
//!     └── TransferProcessor / TxHashSink (downstream collaborators)
//! ```

pub mod batch;
pub mod config;
pub mod cursor;
pub mod error;
pub mod handler;
pub mod head;
pub mod limits;
pub mod recovery;
pub mod sizing;
pub mod state;
pub mod types;

pub use batch::BatchCapability;
pub use config::SyncConfig;
pub use cursor::{CursorManager, CursorRecord, CursorStore, MemoryCursorStore, SyncCursor};
pub use error::SyncError;
pub use handler::{ProcessedLogs, RawLog, TransferContext, TransferProcessor, TxHashSink};
pub use head::{ChainHeadProvider, HeadCache};
pub use limits::{ChainLimitRegistry, ChainLimits, RangeLimit, RangeLimits};
pub use state::{committed_cursor, plan_window, WindowPlan};
pub use types::{BlockTag, SyncState, SyncWindow, TransferDirection, TransferKind};
