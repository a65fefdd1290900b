//! `eth_getLogs` filters for token transfers to and from one wallet.

use serde_json::{json, Value};

use eventsync_core::types::{BlockTag, SyncWindow, TransferDirection, TransferKind};

/// `keccak256("Transfer(address,address,uint256)")`
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// `keccak256("TransferSingle(address,address,address,uint256,uint256)")`
pub const TRANSFER_SINGLE_TOPIC: &str =
    "0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62";
/// `keccak256("TransferBatch(address,address,address,uint256[],uint256[])")`
pub const TRANSFER_BATCH_TOPIC: &str = eventsync_core::handler::TRANSFER_BATCH_TOPIC;

/// One topic position: wildcard, a single value, or any of several values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Any,
    One(String),
    OneOf(Vec<String>),
}

impl Topic {
    fn to_param(&self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::One(t) => Value::String(t.clone()),
            Self::OneOf(ts) => json!(ts),
        }
    }
}

/// A single log query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: String,
    pub from_block: BlockTag,
    pub to_block: BlockTag,
    pub topics: Vec<Topic>,
}

impl LogFilter {
    /// The `eth_getLogs` parameter object.
    pub fn to_param(&self) -> Value {
        json!({
            "address": self.address,
            "fromBlock": self.from_block.to_param(),
            "toBlock": self.to_block.to_param(),
            "topics": self.topics.iter().map(Topic::to_param).collect::<Vec<_>>(),
        })
    }
}

/// Left-pad a 20-byte address into a 32-byte topic.
pub fn address_topic(address: &str) -> String {
    let hex = address.strip_prefix("0x").unwrap_or(address).to_ascii_lowercase();
    format!("0x{hex:0>64}")
}

/// The pair of filters covering one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFilters {
    pub received: LogFilter,
    pub sent: LogFilter,
}

impl TransferFilters {
    /// Filters matching `wallet` as receiver and as sender of `contract`
    /// transfers inside `window`.
    pub fn for_window(kind: TransferKind, contract: &str, wallet: &str, window: &SyncWindow) -> Self {
        Self {
            received: filter(kind, TransferDirection::Received, contract, wallet, window),
            sent: filter(kind, TransferDirection::Sent, contract, wallet, window),
        }
    }
}

fn filter(
    kind: TransferKind,
    direction: TransferDirection,
    contract: &str,
    wallet: &str,
    window: &SyncWindow,
) -> LogFilter {
    let wallet = Topic::One(address_topic(wallet));
    let topics = match (kind, direction) {
        (TransferKind::Erc20 | TransferKind::Erc721, TransferDirection::Received) => {
            vec![Topic::One(TRANSFER_TOPIC.into()), Topic::Any, wallet]
        }
        (TransferKind::Erc20 | TransferKind::Erc721, TransferDirection::Sent) => {
            vec![Topic::One(TRANSFER_TOPIC.into()), wallet]
        }
        (TransferKind::Erc1155, TransferDirection::Received) => {
            vec![erc1155_topic(), Topic::Any, Topic::Any, wallet]
        }
        (TransferKind::Erc1155, TransferDirection::Sent) => vec![erc1155_topic(), Topic::Any, wallet],
    };
    LogFilter {
        address: contract.to_ascii_lowercase(),
        from_block: BlockTag::Number(window.start_block),
        to_block: window.end_block,
        topics,
    }
}

fn erc1155_topic() -> Topic {
    Topic::OneOf(vec![TRANSFER_SINGLE_TOPIC.into(), TRANSFER_BATCH_TOPIC.into()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_core::types::SyncState;

    const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const WALLET: &str = "0x00000000219ab540356cBB839Cbe05303d7705Fa";

    fn window() -> SyncWindow {
        SyncWindow {
            start_block: 256,
            end_block: BlockTag::Latest,
            state: SyncState::UpwardSyncMax,
            upward: true,
            chain_head: 1_000,
        }
    }

    #[test]
    fn wallet_topic_is_left_padded() {
        assert_eq!(
            address_topic(WALLET),
            "0x00000000000000000000000000000000219ab540356cbb839cbe05303d7705fa"
        );
        assert_eq!(address_topic(WALLET).len(), 66);
    }

    #[test]
    fn erc20_filter_shapes() {
        let f = TransferFilters::for_window(TransferKind::Erc20, TOKEN, WALLET, &window());
        let recv = f.received.to_param();
        assert_eq!(recv["address"], TOKEN.to_ascii_lowercase());
        assert_eq!(recv["fromBlock"], "0x100");
        assert_eq!(recv["toBlock"], "latest");
        assert_eq!(recv["topics"][0], TRANSFER_TOPIC);
        assert!(recv["topics"][1].is_null());
        assert_eq!(recv["topics"][2], address_topic(WALLET));

        let sent = f.sent.to_param();
        assert_eq!(sent["topics"].as_array().unwrap().len(), 2);
        assert_eq!(sent["topics"][1], address_topic(WALLET));
    }

    #[test]
    fn erc1155_filter_shapes() {
        let f = TransferFilters::for_window(TransferKind::Erc1155, TOKEN, WALLET, &window());
        let recv = f.received.to_param();
        assert_eq!(recv["topics"][0][0], TRANSFER_SINGLE_TOPIC);
        assert_eq!(recv["topics"][0][1], TRANSFER_BATCH_TOPIC);
        assert!(recv["topics"][1].is_null());
        assert!(recv["topics"][2].is_null());
        assert_eq!(recv["topics"][3], address_topic(WALLET));

        let sent = f.sent.to_param();
        assert_eq!(sent["topics"].as_array().unwrap().len(), 3);
        assert_eq!(sent["topics"][2], address_topic(WALLET));
    }

    #[test]
    fn bounded_window_uses_hex_end() {
        let w = SyncWindow {
            end_block: BlockTag::Number(4_096),
            ..window()
        };
        let f = TransferFilters::for_window(TransferKind::Erc721, TOKEN, WALLET, &w);
        assert_eq!(f.sent.to_param()["toBlock"], "0x1000");
    }
}
