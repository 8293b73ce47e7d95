//! `/info` endpoint request and response shapes.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum InfoRequest {
    AllMids,
    L2Book { coin: String },
    ClearinghouseState { user: Address },
    OpenOrders { user: Address },
    Meta,
    SpotClearinghouseState { user: Address },
}

/// `allMids` response: coin -> price string.
pub type AllMids = HashMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    pub px: String,
    pub sz: String,
    pub n: u64,
}

/// `l2Book` response; `levels[0]` are bids, `levels[1]` asks, best first.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Book {
    pub levels: Vec<Vec<BookLevel>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: String,
    pub total_margin_used: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size string: positive long, negative short.
    pub szi: String,
    pub entry_px: Option<String>,
    pub unrealized_pnl: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub margin_summary: MarginSummary,
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    pub withdrawable: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderInfo {
    pub oid: u64,
    pub coin: String,
    /// "B" bid / "A" ask.
    pub side: String,
    pub limit_px: String,
    /// Remaining size.
    pub sz: String,
    pub orig_sz: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    #[serde(default)]
    pub sz_decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotBalance {
    pub coin: String,
    pub total: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotClearinghouseState {
    pub balances: Vec<SpotBalance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_request_wire_tags() {
        let req = serde_json::to_value(&InfoRequest::AllMids).unwrap();
        assert_eq!(req["type"], "allMids");

        let req = serde_json::to_value(&InfoRequest::L2Book {
            coin: "BTC".to_string(),
        })
        .unwrap();
        assert_eq!(req["type"], "l2Book");
        assert_eq!(req["coin"], "BTC");

        let req = serde_json::to_value(&InfoRequest::SpotClearinghouseState {
            user: Address::ZERO,
        })
        .unwrap();
        assert_eq!(req["type"], "spotClearinghouseState");
    }

    #[test]
    fn test_parse_l2_book() {
        let raw = r#"{
            "coin": "BTC",
            "time": 1700000000000,
            "levels": [
                [{"px": "49999.9", "sz": "1.5", "n": 3}],
                [{"px": "50000.1", "sz": "0.8", "n": 2}]
            ]
        }"#;
        let book: L2Book = serde_json::from_str(raw).unwrap();
        assert_eq!(book.levels[0][0].px, "49999.9");
        assert_eq!(book.levels[1][0].px, "50000.1");
    }

    #[test]
    fn test_parse_clearinghouse_state() {
        let raw = r#"{
            "marginSummary": {"accountValue": "10000.5", "totalMarginUsed": "120.0"},
            "assetPositions": [
                {"position": {"coin": "BTC", "szi": "-0.002", "entryPx": "50100.0", "unrealizedPnl": "-1.2"}}
            ],
            "withdrawable": "9800.0"
        }"#;
        let state: ClearinghouseState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.margin_summary.account_value, "10000.5");
        assert_eq!(state.asset_positions[0].position.szi, "-0.002");
    }

    #[test]
    fn test_parse_open_orders() {
        let raw = r#"[
            {"oid": 77, "coin": "BTC", "side": "B", "limitPx": "49500.0",
             "sz": "0.001", "origSz": "0.001", "timestamp": 1700000000000}
        ]"#;
        let orders: Vec<OpenOrderInfo> = serde_json::from_str(raw).unwrap();
        assert_eq!(orders[0].oid, 77);
        assert_eq!(orders[0].side, "B");
    }
}
