//! Chain-head lookup.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::SyncError;

/// Source of the current block height per chain.
#[async_trait]
pub trait ChainHeadProvider: Send + Sync {
    /// Current head of `chain_id`; `0` means unknown and skips the cycle.
    async fn current_block_height(&self, chain_id: u64) -> Result<u64, SyncError>;
}

/// Head heights pushed in by an external block watcher.
///
/// Heights only move forward; a stale update from a lagging node is ignored.
#[derive(Debug, Default)]
pub struct HeadCache {
    heads: DashMap<u64, u64>,
}

impl HeadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly observed head. Returns the height now cached.
    pub fn update(&self, chain_id: u64, height: u64) -> u64 {
        let mut entry = self.heads.entry(chain_id).or_insert(0);
        if height > *entry {
            *entry = height;
        }
        *entry
    }

    pub fn get(&self, chain_id: u64) -> u64 {
        self.heads.get(&chain_id).map(|h| *h).unwrap_or(0)
    }
}

#[async_trait]
impl ChainHeadProvider for HeadCache {
    async fn current_block_height(&self, chain_id: u64) -> Result<u64, SyncError> {
        Ok(self.get(chain_id))
    }
}
