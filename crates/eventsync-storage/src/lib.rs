//! eventsync-storage — storage backends for EventSync.
//!
//! Each backend implements the cursor store, the transfer processor and the
//! tx-hash sink, so one value can be handed to the engine builder three times.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)

pub mod memory;
pub mod transfer;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{InMemoryStorage, QueuedTx};
pub use transfer::TransferRecord;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
