//! Raw logs and the downstream collaborators fed by each cycle.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::{TransferDirection, TransferKind};

// ─── RawLog ───────────────────────────────────────────────────────────────────

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "blockHash", default)]
    pub block_hash: Option<String>,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Block number, `None` for pending logs.
    pub fn block_number_u64(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_hex_u64)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Token ids carried by this log for the given standard.
    ///
    /// ERC-20 transfers carry none, ERC-721 puts the id in the fourth topic,
    /// ERC-1155 puts it in the data (one word for `TransferSingle`, an array
    /// for `TransferBatch`).
    pub fn token_ids(&self, kind: TransferKind) -> Vec<String> {
        match kind {
            TransferKind::Erc20 => vec![],
            TransferKind::Erc721 => self
                .topics
                .get(3)
                .map(|t| vec![normalize_word(t)])
                .unwrap_or_default(),
            TransferKind::Erc1155 => {
                let words = data_words(&self.data);
                if self.topics.first().map(String::as_str) == Some(TRANSFER_BATCH_TOPIC) {
                    decode_id_array(&words)
                } else {
                    words.first().map(|w| vec![normalize_word(w)]).unwrap_or_default()
                }
            }
        }
    }
}

/// `keccak256("TransferBatch(address,address,address,uint256[],uint256[])")`
pub const TRANSFER_BATCH_TOPIC: &str =
    "0x4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb";

/// Parse a hex-encoded quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

fn data_words(data: &str) -> Vec<&str> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    hex.as_bytes()
        .chunks(64)
        .filter(|c| c.len() == 64)
        .filter_map(|c| std::str::from_utf8(c).ok())
        .collect()
}

/// `0x`-prefixed word with leading zeros stripped (`0x0` for zero).
fn normalize_word(word: &str) -> String {
    let hex = word.strip_prefix("0x").unwrap_or(word).to_ascii_lowercase();
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}

fn word_as_usize(word: &str) -> Option<usize> {
    let trimmed = word.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some(0);
    }
    parse_hex_u64(trimmed).and_then(|v| usize::try_from(v).ok())
}

/// Decode the first ABI `uint256[]` of an event's data section.
fn decode_id_array(words: &[&str]) -> Vec<String> {
    let Some(head) = words.first().and_then(|w| word_as_usize(w)).map(|offset| offset / 32) else {
        return vec![];
    };
    let Some(len) = words.get(head).and_then(|w| word_as_usize(w)) else {
        return vec![];
    };
    words
        .iter()
        .skip(head + 1)
        .take(len)
        .map(|w| normalize_word(w))
        .collect()
}

// ─── Collaborators ────────────────────────────────────────────────────────────

/// Identifies whose transfers a batch of logs belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferContext {
    pub chain_id: u64,
    /// Lowercased token contract address.
    pub contract_address: String,
    /// Lowercased wallet address.
    pub wallet_address: String,
    pub kind: TransferKind,
}

/// What a processor extracted from one direction's logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedLogs {
    pub tx_hashes: BTreeSet<String>,
    pub token_ids: BTreeSet<String>,
}

impl ProcessedLogs {
    /// Collect tx hashes and token ids, skipping logs removed by a reorg.
    pub fn from_logs(kind: TransferKind, logs: &[RawLog]) -> Self {
        let mut out = Self::default();
        for log in logs.iter().filter(|l| !l.is_removed()) {
            out.tx_hashes.insert(log.tx_hash.to_ascii_lowercase());
            out.token_ids.extend(log.token_ids(kind));
        }
        out
    }
}

/// Downstream decoding and storage of matched transfer logs.
#[async_trait]
pub trait TransferProcessor: Send + Sync {
    async fn on_matched_logs(
        &self,
        ctx: &TransferContext,
        direction: TransferDirection,
        logs: &[RawLog],
    ) -> Result<ProcessedLogs, SyncError>;
}

/// Queue that fetches full transactions for hashes seen during a cycle.
#[async_trait]
pub trait TxHashSink: Send + Sync {
    async fn enqueue(&self, chain_id: u64, wallet: &str, tx_hash: &str) -> Result<(), SyncError>;
}
