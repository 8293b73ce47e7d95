use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Normalised view of a resting exchange order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub filled_size: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_fully_filled(&self) -> bool {
        self.filled_size >= self.size
    }
}

/// Snapshot of the market for one symbol. `mid_price` is strictly positive;
/// downstream code relies on it.
#[derive(Debug, Clone, Serialize)]
pub struct MarketData {
    pub symbol: String,
    pub mid_price: Decimal,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub symbol: String,
    /// Signed size: positive long, negative short.
    pub size: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountState {
    pub total_equity: Decimal,
    pub available_balance: Decimal,
    pub margin_used: Decimal,
    pub positions: Vec<Position>,
}

impl AccountState {
    /// Net signed position across all positions for `symbol`.
    pub fn net_position(&self, symbol: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.size)
            .sum()
    }
}

/// Append-only record of one detected fill.
#[derive(Debug, Clone, Serialize)]
pub struct FillRecord {
    pub time: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub pnl: Decimal,
}
