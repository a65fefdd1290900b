//! Provider limits per chain: maximum log-query range and batch support.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default maximum block range for a single log query.
pub const DEFAULT_MAX_RANGE: u64 = 100_000;
/// Default number of requests a provider accepts in one JSON-RPC batch.
pub const DEFAULT_BATCH_LIMIT: u32 = 512;

pub const POLYGON_CHAIN_ID: u64 = 137;
pub const POLYGON_MUMBAI_CHAIN_ID: u64 = 80_001;
pub const POLYGON_AMOY_CHAIN_ID: u64 = 80_002;
pub const OKX_CHAIN_ID: u64 = 66;

const POLYGON_MAX_RANGE: u64 = 3_000;
const OKX_MAX_RANGE: u64 = 2_000;

/// Range limit as seen by the state machine for a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeLimit {
    /// The provider rejects queries spanning more than `max_range` blocks.
    pub enforced: bool,
    pub max_range: u64,
}

impl RangeLimit {
    pub fn enforced(max_range: u64) -> Self {
        Self { enforced: true, max_range }
    }

    pub fn unenforced(max_range: u64) -> Self {
        Self { enforced: false, max_range }
    }

    /// Cap `window_size` at the provider limit when one is enforced.
    pub fn cap(&self, window_size: u64) -> u64 {
        if self.enforced {
            window_size.min(self.max_range)
        } else {
            window_size
        }
    }
}

/// Registry answering provider-limit questions per chain.
pub trait RangeLimits: Send + Sync {
    fn is_range_limit_enforced(&self, chain_id: u64) -> bool;

    fn max_range(&self, chain_id: u64) -> u64;

    /// Whether combined JSON-RPC batches may be attempted at all.
    fn batch_enabled(&self, chain_id: u64) -> bool;

    fn range_limit(&self, chain_id: u64) -> RangeLimit {
        RangeLimit {
            enforced: self.is_range_limit_enforced(chain_id),
            max_range: self.max_range(chain_id),
        }
    }
}

/// Limits for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLimits {
    #[serde(default = "default_max_range")]
    pub max_range: u64,
    #[serde(default)]
    pub range_limit_enforced: bool,
    /// `0` disables batching for the chain.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
}

fn default_max_range() -> u64 { DEFAULT_MAX_RANGE }
fn default_batch_limit() -> u32 { DEFAULT_BATCH_LIMIT }

impl Default for ChainLimits {
    fn default() -> Self {
        Self {
            max_range: DEFAULT_MAX_RANGE,
            range_limit_enforced: false,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Static registry seeded with the known provider quirks.
#[derive(Debug, Clone)]
pub struct ChainLimitRegistry {
    defaults: ChainLimits,
    chains: HashMap<u64, ChainLimits>,
}

impl ChainLimitRegistry {
    /// Registry with the built-in per-chain limits.
    pub fn new() -> Self {
        let polygon = ChainLimits {
            max_range: POLYGON_MAX_RANGE,
            range_limit_enforced: true,
            ..ChainLimits::default()
        };
        let mut chains = HashMap::new();
        chains.insert(POLYGON_CHAIN_ID, polygon);
        chains.insert(POLYGON_MUMBAI_CHAIN_ID, polygon);
        chains.insert(
            POLYGON_AMOY_CHAIN_ID,
            ChainLimits {
                range_limit_enforced: true,
                ..ChainLimits::default()
            },
        );
        chains.insert(
            OKX_CHAIN_ID,
            ChainLimits {
                max_range: OKX_MAX_RANGE,
                ..ChainLimits::default()
            },
        );
        Self {
            defaults: ChainLimits::default(),
            chains,
        }
    }

    /// Override the limits for one chain.
    pub fn with_chain(mut self, chain_id: u64, limits: ChainLimits) -> Self {
        self.chains.insert(chain_id, limits);
        self
    }

    /// Apply a set of overrides (typically loaded from a config file).
    pub fn with_overrides(mut self, overrides: &HashMap<u64, ChainLimits>) -> Self {
        self.chains.extend(overrides.iter().map(|(id, l)| (*id, *l)));
        self
    }

    pub fn limits(&self, chain_id: u64) -> ChainLimits {
        self.chains.get(&chain_id).copied().unwrap_or(self.defaults)
    }
}

impl Default for ChainLimitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeLimits for ChainLimitRegistry {
    fn is_range_limit_enforced(&self, chain_id: u64) -> bool {
        self.limits(chain_id).range_limit_enforced
    }

    fn max_range(&self, chain_id: u64) -> u64 {
        self.limits(chain_id).max_range
    }

    fn batch_enabled(&self, chain_id: u64) -> bool {
        self.limits(chain_id).batch_limit > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_polygon_limits() {
        let reg = ChainLimitRegistry::new();
        assert!(reg.is_range_limit_enforced(POLYGON_CHAIN_ID));
        assert_eq!(reg.max_range(POLYGON_CHAIN_ID), 3_000);
        assert_eq!(reg.range_limit(POLYGON_MUMBAI_CHAIN_ID), RangeLimit::enforced(3_000));
    }

    #[test]
    fn amoy_enforced_at_default_range() {
        let reg = ChainLimitRegistry::new();
        assert_eq!(reg.range_limit(POLYGON_AMOY_CHAIN_ID), RangeLimit::enforced(DEFAULT_MAX_RANGE));
    }

    #[test]
    fn okx_has_smaller_range_but_no_enforcement() {
        let reg = ChainLimitRegistry::new();
        assert!(!reg.is_range_limit_enforced(OKX_CHAIN_ID));
        assert_eq!(reg.max_range(OKX_CHAIN_ID), 2_000);
    }

    #[test]
    fn unknown_chain_uses_defaults() {
        let reg = ChainLimitRegistry::new();
        assert_eq!(reg.range_limit(1), RangeLimit::unenforced(DEFAULT_MAX_RANGE));
        assert!(reg.batch_enabled(1));
    }

    #[test]
    fn overrides_replace_builtins() {
        let mut overrides = HashMap::new();
        overrides.insert(
            1,
            ChainLimits {
                max_range: 10_000,
                range_limit_enforced: true,
                batch_limit: 0,
            },
        );
        let reg = ChainLimitRegistry::new().with_overrides(&overrides);
        assert_eq!(reg.range_limit(1), RangeLimit::enforced(10_000));
        assert!(!reg.batch_enabled(1));
    }

    #[test]
    fn cap_only_when_enforced() {
        assert_eq!(RangeLimit::enforced(3_000).cap(9_000), 3_000);
        assert_eq!(RangeLimit::unenforced(3_000).cap(9_000), 9_000);
    }

    #[test]
    fn chain_limits_deserialize_with_defaults() {
        let limits: ChainLimits = serde_json::from_str(r#"{"range_limit_enforced": true}"#).unwrap();
        assert_eq!(limits.max_range, DEFAULT_MAX_RANGE);
        assert_eq!(limits.batch_limit, DEFAULT_BATCH_LIMIT);
        assert!(limits.range_limit_enforced);
    }
}
