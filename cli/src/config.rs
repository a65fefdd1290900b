//! CLI configuration file (`--config <path.json>`).
//!
//! ```json
//! {
//!   "db": "./eventsync.db",
//!   "log": { "level": "info", "components": { "eventsync-evm": "debug" } },
//!   "rpc": { "137": "https://polygon-rpc.com" },
//!   "chains": { "137": { "max_range": 2000, "range_limit_enforced": true } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use eventsync_core::ChainLimits;

use crate::logging::LogConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// SQLite database path.
    #[serde(default = "default_db")]
    pub db: String,
    #[serde(default)]
    pub log: LogConfig,
    /// RPC endpoint per chain id.
    #[serde(default)]
    pub rpc: HashMap<u64, String>,
    /// Provider limit overrides per chain id.
    #[serde(default)]
    pub chains: HashMap<u64, ChainLimits>,
}

fn default_db() -> String {
    "./eventsync.db".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db: default_db(),
            log: LogConfig::default(),
            rpc: HashMap::new(),
            chains: HashMap::new(),
        }
    }
}

impl CliConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file '{}'", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config file '{}'", path.display()))
    }

    /// RPC URL for `chain_id`: the flag, then `EVENTSYNC_RPC_<CHAIN_ID>`, then
    /// the config file.
    pub fn rpc_url(&self, chain_id: u64, flag: Option<&str>) -> Result<String> {
        if let Some(url) = flag {
            return Ok(url.to_string());
        }
        let env_key = format!("EVENTSYNC_RPC_{chain_id}");
        if let Ok(url) = std::env::var(&env_key) {
            return Ok(url);
        }
        if let Some(url) = self.rpc.get(&chain_id) {
            return Ok(url.clone());
        }
        anyhow::bail!("no RPC URL for chain {chain_id}. Set {env_key}, add it to the config file or pass --rpc <url>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_with_defaults() {
        let config: CliConfig = serde_json::from_str(
            r#"{
                "rpc": { "137": "https://polygon.example" },
                "chains": { "137": { "max_range": 2000, "range_limit_enforced": true } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.db, "./eventsync.db");
        assert_eq!(config.log.level, "info");

        let polygon = config.chains[&137];
        assert_eq!(polygon.max_range, 2_000);
        assert!(polygon.range_limit_enforced);
        assert_eq!(polygon.batch_limit, 512);
    }

    #[test]
    fn flag_wins_over_file() {
        let mut config = CliConfig::default();
        config.rpc.insert(424_242, "https://file.example".into());
        assert_eq!(config.rpc_url(424_242, Some("https://flag.example")).unwrap(), "https://flag.example");
        assert_eq!(config.rpc_url(424_242, None).unwrap(), "https://file.example");
        assert!(config.rpc_url(424_243, None).is_err());
    }

    #[test]
    fn missing_path_gives_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }
}
