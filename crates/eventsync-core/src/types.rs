//! Shared types for the sync engine.

use serde::{Deserialize, Serialize};

// ─── SyncState ────────────────────────────────────────────────────────────────

/// Phase of the scan for one (chain, contract) pair.
///
/// The ordinal of each variant is what the cursor store persists, so the
/// declaration order must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Nothing scanned yet.
    DownwardSyncStart,
    /// Backfilling from the start snapshot toward genesis.
    DownwardSync,
    /// Backfill reached block 1; reseeds into the upward sweep on commit.
    DownwardSyncComplete,
    /// Caught up: scanning `[last_read, latest]`.
    UpwardSyncMax,
    /// Catching up in bounded windows.
    UpwardSync,
}

impl SyncState {
    const ALL: [SyncState; 5] = [
        SyncState::DownwardSyncStart,
        SyncState::DownwardSync,
        SyncState::DownwardSyncComplete,
        SyncState::UpwardSyncMax,
        SyncState::UpwardSync,
    ];

    /// The persisted ordinal.
    pub fn ordinal(self) -> i64 {
        self as i64
    }

    /// Decode a persisted ordinal; `None` when out of range.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Returns `true` for the phases that sweep toward the chain head.
    pub fn is_upward(self) -> bool {
        matches!(self, Self::UpwardSync | Self::UpwardSyncMax)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DownwardSyncStart => write!(f, "downward-sync-start"),
            Self::DownwardSync => write!(f, "downward-sync"),
            Self::DownwardSyncComplete => write!(f, "downward-sync-complete"),
            Self::UpwardSyncMax => write!(f, "upward-sync-max"),
            Self::UpwardSync => write!(f, "upward-sync"),
        }
    }
}

// ─── BlockTag ─────────────────────────────────────────────────────────────────

/// Upper bound of a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockTag {
    Number(u64),
    /// Whatever the node considers its head when it serves the query.
    Latest,
}

impl BlockTag {
    /// The JSON-RPC block parameter (`"0x…"` or `"latest"`).
    pub fn to_param(self) -> String {
        match self {
            Self::Number(n) => format!("0x{n:x}"),
            Self::Latest => "latest".to_string(),
        }
    }

    /// The numeric bound, or `None` for `Latest`.
    pub fn number(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Latest => None,
        }
    }

    pub fn is_latest(self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Numeric bound with `Latest` resolved to `head`.
    pub fn resolve(self, head: u64) -> u64 {
        self.number().unwrap_or(head)
    }
}

impl std::fmt::Display for BlockTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

// ─── SyncWindow ───────────────────────────────────────────────────────────────

/// One scan request. Recomputed every cycle, never persisted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    /// First block of the query (inclusive, always ≥ 1).
    pub start_block: u64,
    /// Last block of the query (inclusive).
    pub end_block: BlockTag,
    /// State the cursor moves to once this window is committed.
    pub state: SyncState,
    /// `true` when the window sweeps toward the chain head.
    pub upward: bool,
    /// Chain head observed when the window was computed.
    pub chain_head: u64,
}

impl SyncWindow {
    /// Number of blocks spanned, resolving `Latest` to the observed head.
    pub fn width(&self) -> u64 {
        self.end_block
            .resolve(self.chain_head)
            .saturating_sub(self.start_block)
    }
}

impl std::fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}] {}", self.start_block, self.end_block, self.state)
    }
}

// ─── Transfers ────────────────────────────────────────────────────────────────

/// Token standard of the tracked contract; decides the log filter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    #[default]
    Erc20,
    Erc721,
    Erc1155,
}

impl std::str::FromStr for TransferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc20" => Ok(Self::Erc20),
            "erc721" => Ok(Self::Erc721),
            "erc1155" => Ok(Self::Erc1155),
            other => Err(format!("unknown token standard: {other}")),
        }
    }
}

/// Which side of a transfer the tracked wallet is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    Received,
    Sent,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Sent => write!(f, "sent"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
