//! Stored form of a matched transfer log.

use serde::{Deserialize, Serialize};

use eventsync_core::handler::{parse_hex_u64, RawLog, TransferContext};
use eventsync_core::types::TransferDirection;

/// `(chain_id, contract, tx_hash, log_index, direction)`
pub type TransferKey = (u64, String, String, u64, TransferDirection);

/// One transfer log matched for a tracked wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub chain_id: u64,
    pub contract_address: String,
    pub wallet_address: String,
    pub direction: TransferDirection,
    pub tx_hash: String,
    pub log_index: u64,
    pub block_number: Option<u64>,
    pub token_ids: Vec<String>,
    /// Raw data section (amounts live here).
    pub data: String,
}

impl TransferRecord {
    pub fn from_log(ctx: &TransferContext, direction: TransferDirection, log: &RawLog) -> Self {
        Self {
            chain_id: ctx.chain_id,
            contract_address: ctx.contract_address.clone(),
            wallet_address: ctx.wallet_address.clone(),
            direction,
            tx_hash: log.tx_hash.to_ascii_lowercase(),
            log_index: log.log_index.as_deref().and_then(parse_hex_u64).unwrap_or(0),
            block_number: log.block_number_u64(),
            token_ids: log.token_ids(ctx.kind),
            data: log.data.clone(),
        }
    }

    /// Identity used to drop duplicates when a window is processed twice.
    pub fn key(&self) -> TransferKey {
        (
            self.chain_id,
            self.contract_address.clone(),
            self.tx_hash.clone(),
            self.log_index,
            self.direction,
        )
    }
}

#[cfg(feature = "sqlite")]
pub(crate) fn direction_str(direction: TransferDirection) -> &'static str {
    match direction {
        TransferDirection::Received => "received",
        TransferDirection::Sent => "sent",
    }
}

#[cfg(feature = "sqlite")]
pub(crate) fn parse_direction(s: &str) -> Option<TransferDirection> {
    match s {
        "received" => Some(TransferDirection::Received),
        "sent" => Some(TransferDirection::Sent),
        _ => None,
    }
}
