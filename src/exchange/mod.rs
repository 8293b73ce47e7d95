//! Exchange boundary: the capability contract the strategy depends on, the
//! signed REST backend, and an in-memory double for tests.

use crate::error::Result;
use crate::model::{AccountState, MarketData, Order, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;

pub mod actions;
pub mod client;
pub mod http;
pub mod info;
pub mod mock;
pub mod signing;

pub use client::HyperliquidClient;
pub use mock::MockExchange;

/// Capability set the strategy and orchestrator program against.
///
/// Deliberately thin so an in-memory fake can back unit tests. Callers must
/// tolerate that an order visible in a place-response may not yet appear in
/// the next `open_orders` snapshot.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Market snapshot with a strictly positive mid.
    async fn market_data(&self, symbol: &str) -> Result<MarketData>;

    async fn account_state(&self) -> Result<AccountState>;

    /// Snapshot of currently resting orders for the account.
    async fn open_orders(&self) -> Result<Vec<Order>>;

    /// Place a GTC limit order; returns the exchange-assigned order id.
    async fn place_limit_order(
        &self,
        symbol: &str,
        asset: u32,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<u64>;

    /// True iff the exchange confirmed removal.
    async fn cancel_order(&self, asset: u32, order_id: u64) -> Result<bool>;

    /// Cancel every resting order for `asset`; returns the count removed.
    async fn cancel_all_orders(&self, asset: u32) -> Result<usize>;

    /// 0-based index of `symbol` in the perp universe.
    async fn asset_index(&self, symbol: &str) -> Result<u32>;

    async fn spot_usdc_balance(&self) -> Result<Decimal>;

    /// Move spot USDC into the perp margin account. The balance moves
    /// asynchronously at the exchange.
    async fn transfer_spot_to_perps(&self, amount: Decimal) -> Result<()>;
}
