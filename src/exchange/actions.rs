//! Signable exchange actions and their wire encodings.
//!
//! L1 actions (order, cancel) are MsgPack-encoded with map key order
//! preserved, extended with the nonce and vault flag, and hashed to the
//! `connectionId` the phantom agent commits to. Byte layout here is
//! interoperability-critical; change nothing casually.

use crate::error::{EngineError, Result};
use alloy::primitives::{keccak256, Address, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// Render a decimal for the wire: at most 8 significant digits, trailing
/// zeros stripped, never scientific notation, locale independent.
pub fn to_wire(value: Decimal) -> String {
    value.round_sf(8).unwrap_or(value).normalize().to_string()
}

fn serialize_chain_id_hex<S>(val: &u64, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&format!("0x{val:x}"))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LimitWire {
    pub tif: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
pub enum OrderTypeWire {
    Limit(LimitWire),
}

impl OrderTypeWire {
    pub fn gtc() -> Self {
        OrderTypeWire::Limit(LimitWire {
            tif: "Gtc".to_string(),
        })
    }
}

/// One order row. Field order and single-letter keys are part of the
/// signed byte layout.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BulkCancel {
    pub cancels: Vec<CancelWire>,
}

/// User-signed spot <-> perp transfer (Scheme B; never MsgPack-hashed).
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsdClassTransfer {
    #[serde(serialize_with = "serialize_chain_id_hex")]
    pub signature_chain_id: u64,
    pub hyperliquid_chain: String,
    pub amount: String,
    pub to_perp: bool,
    pub nonce: u64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum Actions {
    Order(BulkOrder),
    Cancel(BulkCancel),
    UsdClassTransfer(UsdClassTransfer),
}

impl Actions {
    /// `connectionId` = keccak256(msgpack(action) || nonce_be8 || vault flag).
    pub fn hash(&self, nonce: u64, vault_address: Option<Address>) -> Result<B256> {
        let mut bytes =
            rmp_serde::to_vec_named(self).map_err(|e| EngineError::Signing(e.to_string()))?;
        bytes.extend(nonce.to_be_bytes());
        match vault_address {
            Some(addr) => {
                bytes.push(1);
                bytes.extend(addr.as_slice());
            }
            None => bytes.push(0),
        }
        Ok(keccak256(bytes))
    }
}

// ============================================================
// Exchange response shapes
// ============================================================

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RestingOrder {
    pub oid: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FilledOrder {
    pub oid: u64,
    pub total_sz: String,
    pub avg_px: String,
}

/// Per-row outcome inside an exchange response. `Success` is the bare
/// string cancels report; orders report one of the tagged variants.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ExchangeDataStatus {
    Resting(RestingOrder),
    Filled(FilledOrder),
    Error(String),
    Success,
    WaitingForFill,
    WaitingForTrigger,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeDataStatuses {
    pub statuses: Vec<ExchangeDataStatus>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeResponse {
    #[serde(default)]
    pub data: Option<ExchangeDataStatuses>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "status", content = "response")]
pub enum ExchangeResponseStatus {
    Ok(ExchangeResponse),
    Err(String),
}
