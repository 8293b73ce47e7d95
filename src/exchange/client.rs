//! Signed REST backend for Hyperliquid.

use crate::config::ExchangeConfig;
use crate::error::{EngineError, Result};
use crate::exchange::actions::{
    to_wire, Actions, BulkCancel, BulkOrder, CancelWire, ExchangeDataStatus,
    ExchangeResponseStatus, OrderTypeWire, OrderWire, UsdClassTransfer,
};
use crate::exchange::http::HttpClient;
use crate::exchange::info::{
    AllMids, ClearinghouseState, InfoRequest, L2Book, Meta, OpenOrderInfo, SpotClearinghouseState,
};
use crate::exchange::signing::{
    hyperliquid_chain, next_nonce, serialize_signature, sign_l1_action, sign_usd_class_transfer,
    signature_chain_id,
};
use crate::exchange::ExchangeClient;
use crate::model::{AccountState, MarketData, Order, Position, Side};
use alloy::primitives::{Address, PrimitiveSignature};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangePayload {
    action: serde_json::Value,
    #[serde(serialize_with = "serialize_signature")]
    signature: PrimitiveSignature,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
}

pub struct HyperliquidClient {
    http: HttpClient,
    wallet: PrivateKeySigner,
    user: Address,
    is_mainnet: bool,
    coin_to_asset: Mutex<HashMap<String, u32>>,
}

// Custom Debug so the private key can never leak into logs.
impl std::fmt::Debug for HyperliquidClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperliquidClient")
            .field("user", &self.user)
            .field("is_mainnet", &self.is_mainnet)
            .field("wallet", &"<redacted>")
            .finish()
    }
}

impl HyperliquidClient {
    pub fn new(cfg: &ExchangeConfig) -> Result<Self> {
        let wallet: PrivateKeySigner = cfg
            .private_key
            .parse()
            .map_err(|e| EngineError::Config(format!("invalid private key: {}", e)))?;
        let user: Address = cfg
            .wallet_address
            .parse()
            .map_err(|e| EngineError::Config(format!("invalid wallet address: {}", e)))?;

        Ok(Self {
            http: HttpClient::new(cfg.is_mainnet)?,
            wallet,
            user,
            is_mainnet: cfg.is_mainnet,
            coin_to_asset: Mutex::new(HashMap::new()),
        })
    }

    async fn info<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T> {
        let body = serde_json::to_string(request)?;
        let raw = self.http.post("/info", body).await?;
        serde_json::from_str(&raw).map_err(|e| EngineError::Parse(e.to_string()))
    }

    async fn post_signed(
        &self,
        action: serde_json::Value,
        signature: PrimitiveSignature,
        nonce: u64,
    ) -> Result<ExchangeResponseStatus> {
        let payload = ExchangePayload {
            action,
            signature,
            nonce,
            vault_address: None,
            expires_after: None,
        };
        let body = serde_json::to_string(&payload)?;
        // The payload carries a signature; never log it.
        debug!("Posting exchange action");
        let raw = self.http.post("/exchange", body).await?;
        serde_json::from_str(&raw).map_err(|e| EngineError::Parse(e.to_string()))
    }

    async fn post_l1_action(&self, action: Actions) -> Result<ExchangeResponseStatus> {
        let nonce = next_nonce();
        let connection_id = action.hash(nonce, None)?;
        let signature = sign_l1_action(&self.wallet, connection_id, self.is_mainnet)?;
        let action_json = serde_json::to_value(&action)?;
        self.post_signed(action_json, signature, nonce).await
    }

    async fn refresh_asset_map(&self) -> Result<()> {
        let meta: Meta = self.info(&InfoRequest::Meta).await?;
        let mut map = self.coin_to_asset.lock().expect("asset map lock");
        map.clear();
        for (index, asset) in meta.universe.iter().enumerate() {
            map.insert(asset.name.clone(), index as u32);
        }
        Ok(())
    }

    fn parse_decimal(value: &str, what: &str) -> Result<Decimal> {
        value
            .parse()
            .map_err(|_| EngineError::Parse(format!("bad {} '{}'", what, value)))
    }
}

#[async_trait]
impl ExchangeClient for HyperliquidClient {
    async fn market_data(&self, symbol: &str) -> Result<MarketData> {
        let book: L2Book = self
            .info(&InfoRequest::L2Book {
                coin: symbol.to_string(),
            })
            .await?;

        let best_bid = book.levels.first().and_then(|side| side.first());
        let best_ask = book.levels.get(1).and_then(|side| side.first());

        let (bid, ask, mid) = match (best_bid, best_ask) {
            (Some(b), Some(a)) => {
                let bid = Self::parse_decimal(&b.px, "bid px")?;
                let ask = Self::parse_decimal(&a.px, "ask px")?;
                (bid, ask, (bid + ask) / Decimal::TWO)
            }
            // Thin book: fall back to the exchange-reported mid.
            _ => {
                let mids: AllMids = self.info(&InfoRequest::AllMids).await?;
                let raw = mids
                    .get(symbol)
                    .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))?;
                let mid = Self::parse_decimal(raw, "mid px")?;
                (mid, mid, mid)
            }
        };

        if mid <= Decimal::ZERO {
            return Err(EngineError::Parse(format!(
                "non-positive mid {} for {}",
                mid, symbol
            )));
        }

        Ok(MarketData {
            symbol: symbol.to_string(),
            mid_price: mid,
            bid_price: bid,
            ask_price: ask,
            timestamp: Utc::now(),
        })
    }

    async fn account_state(&self) -> Result<AccountState> {
        let state: ClearinghouseState = self
            .info(&InfoRequest::ClearinghouseState { user: self.user })
            .await?;

        let mut positions = Vec::with_capacity(state.asset_positions.len());
        for entry in &state.asset_positions {
            let p = &entry.position;
            positions.push(Position {
                symbol: p.coin.clone(),
                size: Self::parse_decimal(&p.szi, "position size")?,
                entry_price: match &p.entry_px {
                    Some(px) => Self::parse_decimal(px, "entry px")?,
                    None => Decimal::ZERO,
                },
                unrealized_pnl: Self::parse_decimal(&p.unrealized_pnl, "unrealized pnl")?,
            });
        }

        Ok(AccountState {
            total_equity: Self::parse_decimal(&state.margin_summary.account_value, "equity")?,
            available_balance: Self::parse_decimal(&state.withdrawable, "withdrawable")?,
            margin_used: Self::parse_decimal(&state.margin_summary.total_margin_used, "margin")?,
            positions,
        })
    }

    async fn open_orders(&self) -> Result<Vec<Order>> {
        let raw: Vec<OpenOrderInfo> = self.info(&InfoRequest::OpenOrders { user: self.user }).await?;

        let mut orders = Vec::with_capacity(raw.len());
        for info in raw {
            let size = Self::parse_decimal(&info.orig_sz, "order size")?;
            let remaining = Self::parse_decimal(&info.sz, "order remaining")?;
            orders.push(Order {
                id: info.oid,
                symbol: info.coin,
                side: if info.side == "B" { Side::Buy } else { Side::Sell },
                price: Self::parse_decimal(&info.limit_px, "limit px")?,
                size,
                filled_size: size - remaining,
                created_at: DateTime::<Utc>::from_timestamp_millis(info.timestamp as i64)
                    .unwrap_or_else(Utc::now),
            });
        }
        Ok(orders)
    }

    async fn place_limit_order(
        &self,
        _symbol: &str,
        asset: u32,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<u64> {
        if price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(EngineError::Rejected(format!(
                "non-positive price {} or size {}",
                price, size
            )));
        }

        let action = Actions::Order(BulkOrder {
            orders: vec![OrderWire {
                asset,
                is_buy: side.is_buy(),
                limit_px: to_wire(price),
                sz: to_wire(size),
                reduce_only: false,
                order_type: OrderTypeWire::gtc(),
            }],
            grouping: "na".to_string(),
        });

        match self.post_l1_action(action).await? {
            ExchangeResponseStatus::Ok(res) => {
                let statuses = res
                    .data
                    .map(|d| d.statuses)
                    .unwrap_or_default();
                match statuses.into_iter().next() {
                    Some(ExchangeDataStatus::Resting(r)) => Ok(r.oid),
                    // Crossed immediately; still a valid order id.
                    Some(ExchangeDataStatus::Filled(f)) => Ok(f.oid),
                    Some(ExchangeDataStatus::Error(e)) => Err(EngineError::Rejected(e)),
                    other => Err(EngineError::Rejected(format!(
                        "unexpected order status {:?}",
                        other
                    ))),
                }
            }
            ExchangeResponseStatus::Err(e) => Err(EngineError::Rejected(e)),
        }
    }

    async fn cancel_order(&self, asset: u32, order_id: u64) -> Result<bool> {
        let action = Actions::Cancel(BulkCancel {
            cancels: vec![CancelWire {
                asset,
                oid: order_id,
            }],
        });

        match self.post_l1_action(action).await? {
            ExchangeResponseStatus::Ok(res) => {
                let statuses = res.data.map(|d| d.statuses).unwrap_or_default();
                match statuses.into_iter().next() {
                    Some(ExchangeDataStatus::Success) => Ok(true),
                    Some(ExchangeDataStatus::Error(e)) => {
                        warn!("Cancel of oid {} declined: {}", order_id, e);
                        Ok(false)
                    }
                    other => {
                        warn!("Unexpected cancel status for oid {}: {:?}", order_id, other);
                        Ok(false)
                    }
                }
            }
            ExchangeResponseStatus::Err(e) => Err(EngineError::Rejected(e)),
        }
    }

    async fn cancel_all_orders(&self, asset: u32) -> Result<usize> {
        let open = self.open_orders().await?;
        if self.coin_to_asset.lock().expect("asset map lock").is_empty() {
            self.refresh_asset_map().await?;
        }
        let map = self.coin_to_asset.lock().expect("asset map lock").clone();

        let cancels: Vec<CancelWire> = open
            .iter()
            .filter(|o| map.get(&o.symbol).copied() == Some(asset))
            .map(|o| CancelWire { asset, oid: o.id })
            .collect();
        if cancels.is_empty() {
            return Ok(0);
        }

        let total = cancels.len();
        let action = Actions::Cancel(BulkCancel { cancels });
        match self.post_l1_action(action).await? {
            ExchangeResponseStatus::Ok(res) => {
                let statuses = res.data.map(|d| d.statuses).unwrap_or_default();
                let removed = statuses
                    .iter()
                    .filter(|s| matches!(s, ExchangeDataStatus::Success))
                    .count();
                if removed < total {
                    warn!("Cancelled {}/{} resting orders", removed, total);
                }
                Ok(removed)
            }
            ExchangeResponseStatus::Err(e) => Err(EngineError::Rejected(e)),
        }
    }

    async fn asset_index(&self, symbol: &str) -> Result<u32> {
        if let Some(index) = self
            .coin_to_asset
            .lock()
            .expect("asset map lock")
            .get(symbol)
        {
            return Ok(*index);
        }
        self.refresh_asset_map().await?;
        self.coin_to_asset
            .lock()
            .expect("asset map lock")
            .get(symbol)
            .copied()
            .ok_or_else(|| EngineError::AssetNotFound(symbol.to_string()))
    }

    async fn spot_usdc_balance(&self) -> Result<Decimal> {
        let state: SpotClearinghouseState = self
            .info(&InfoRequest::SpotClearinghouseState { user: self.user })
            .await?;
        match state.balances.iter().find(|b| b.coin == "USDC") {
            Some(balance) => Self::parse_decimal(&balance.total, "spot balance"),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn transfer_spot_to_perps(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Rejected(format!(
                "non-positive transfer amount {}",
                amount
            )));
        }

        let time = next_nonce();
        let amount_str = to_wire(amount);
        let destination = format!("{:#x}", self.user);
        let signature =
            sign_usd_class_transfer(&self.wallet, self.is_mainnet, &destination, &amount_str, time)?;

        let action = Actions::UsdClassTransfer(UsdClassTransfer {
            signature_chain_id: signature_chain_id(self.is_mainnet),
            hyperliquid_chain: hyperliquid_chain(self.is_mainnet).to_string(),
            amount: amount_str,
            to_perp: true,
            nonce: time,
        });
        let action_json = serde_json::to_value(&action)?;

        match self.post_signed(action_json, signature, time).await? {
            ExchangeResponseStatus::Ok(_) => Ok(()),
            ExchangeResponseStatus::Err(e) => Err(EngineError::Rejected(e)),
        }
    }
}
