//! Per-chain record of providers that cannot serve combined log batches.

use dashmap::DashSet;

/// Chains whose provider failed a batched log query.
///
/// Marks are sticky for the lifetime of the value. Share one instance
/// (behind an `Arc`) between all engines of a process so a downgrade found by
/// one token applies to every token on that chain.
#[derive(Debug, Default)]
pub struct BatchCapability {
    unsupported: DashSet<u64>,
}

impl BatchCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `chain_id` must use sequential queries from now on.
    /// Returns `true` if the chain was not marked before.
    pub fn mark_unsupported(&self, chain_id: u64) -> bool {
        self.unsupported.insert(chain_id)
    }

    pub fn is_unsupported(&self, chain_id: u64) -> bool {
        self.unsupported.contains(&chain_id)
    }

    pub fn len(&self) -> usize {
        self.unsupported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unsupported.is_empty()
    }
}
