//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::TransferKind;

/// Binding of one engine instance: which token to scan for which wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub chain_id: u64,
    /// Token contract whose transfer logs are scanned.
    pub contract_address: String,
    /// Wallet matched as sender or receiver.
    pub wallet_address: String,
    #[serde(default)]
    pub transfer_kind: TransferKind,
    /// Narrowed retries allowed inside one `sync_once` call before giving up
    /// until the next tick.
    #[serde(default = "default_max_immediate_retries")]
    pub max_immediate_retries: u32,
}

fn default_max_immediate_retries() -> u32 { 4 }

impl SyncConfig {
    pub fn new(chain_id: u64, contract_address: impl Into<String>, wallet_address: impl Into<String>) -> Self {
        Self {
            chain_id,
            contract_address: contract_address.into(),
            wallet_address: wallet_address.into(),
            transfer_kind: TransferKind::default(),
            max_immediate_retries: default_max_immediate_retries(),
        }
    }

    /// Check both addresses and lowercase them.
    pub fn normalized(mut self) -> Result<Self, SyncError> {
        if self.chain_id == 0 {
            return Err(SyncError::Config("chain_id must be non-zero".into()));
        }
        self.contract_address = normalize_address(&self.contract_address)
            .ok_or_else(|| SyncError::Config(format!("invalid contract address: {}", self.contract_address)))?;
        self.wallet_address = normalize_address(&self.wallet_address)
            .ok_or_else(|| SyncError::Config(format!("invalid wallet address: {}", self.wallet_address)))?;
        Ok(self)
    }
}

/// Lowercase a `0x`-prefixed 20-byte hex address; `None` if malformed.
pub fn normalize_address(address: &str) -> Option<String> {
    let hex = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X"))?;
    if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("0x{}", hex.to_ascii_lowercase()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const WALLET: &str = "0x00000000219ab540356cBB839Cbe05303d7705Fa";

    #[test]
    fn deserializes_with_defaults() {
        let json = format!(r#"{{"chain_id": 1, "contract_address": "{TOKEN}", "wallet_address": "{WALLET}"}}"#);
        let cfg: SyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.transfer_kind, TransferKind::Erc20);
        assert_eq!(cfg.max_immediate_retries, 4);
    }

    #[test]
    fn normalizes_addresses() {
        let cfg = SyncConfig::new(1, TOKEN, WALLET).normalized().unwrap();
        assert_eq!(cfg.contract_address, TOKEN.to_ascii_lowercase());
        assert_eq!(cfg.wallet_address, WALLET.to_ascii_lowercase());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(SyncConfig::new(0, TOKEN, WALLET).normalized().is_err());
        assert!(SyncConfig::new(1, "0x1234", WALLET).normalized().is_err());
        assert!(SyncConfig::new(1, TOKEN, "not-an-address").normalized().is_err());
    }
}
