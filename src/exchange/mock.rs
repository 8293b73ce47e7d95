//! In-memory exchange double backing the strategy and engine tests.
//!
//! Orders rest in a plain list; a fill is simulated by removing an order id
//! from it, which is exactly what the strategy's diff sees in production.

use crate::error::{EngineError, Result};
use crate::exchange::ExchangeClient;
use crate::model::{AccountState, MarketData, Order, Position, Side};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    mid_price: Decimal,
    equity: Decimal,
    available: Decimal,
    positions: Vec<Position>,
    spot_usdc: Decimal,
    open: Vec<Order>,
    next_oid: u64,
    fail_placements: bool,
    place_calls: usize,
    cancel_calls: usize,
    cancel_all_calls: usize,
    transfers: Vec<Decimal>,
}

#[derive(Debug)]
pub struct MockExchange {
    state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new(mid_price: Decimal, equity: Decimal) -> Self {
        Self {
            state: Mutex::new(MockState {
                mid_price,
                equity,
                available: equity,
                next_oid: 1,
                ..MockState::default()
            }),
        }
    }

    pub fn set_mid_price(&self, mid: Decimal) {
        self.state.lock().unwrap().mid_price = mid;
    }

    pub fn set_equity(&self, equity: Decimal) {
        let mut state = self.state.lock().unwrap();
        state.equity = equity;
        state.available = equity;
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        self.state.lock().unwrap().positions = positions;
    }

    pub fn set_spot_usdc(&self, balance: Decimal) {
        self.state.lock().unwrap().spot_usdc = balance;
    }

    pub fn set_fail_placements(&self, fail: bool) {
        self.state.lock().unwrap().fail_placements = fail;
    }

    /// Simulate a fill: the order disappears from the open-orders snapshot.
    pub fn remove_order(&self, oid: u64) -> Option<Order> {
        let mut state = self.state.lock().unwrap();
        let index = state.open.iter().position(|o| o.id == oid)?;
        Some(state.open.remove(index))
    }

    pub fn resting_orders(&self) -> Vec<Order> {
        self.state.lock().unwrap().open.clone()
    }

    pub fn place_calls(&self) -> usize {
        self.state.lock().unwrap().place_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn cancel_all_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_all_calls
    }

    pub fn transfers(&self) -> Vec<Decimal> {
        self.state.lock().unwrap().transfers.clone()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn market_data(&self, symbol: &str) -> Result<MarketData> {
        let state = self.state.lock().unwrap();
        Ok(MarketData {
            symbol: symbol.to_string(),
            mid_price: state.mid_price,
            bid_price: state.mid_price - dec!(0.1),
            ask_price: state.mid_price + dec!(0.1),
            timestamp: Utc::now(),
        })
    }

    async fn account_state(&self) -> Result<AccountState> {
        let state = self.state.lock().unwrap();
        Ok(AccountState {
            total_equity: state.equity,
            available_balance: state.available,
            margin_used: Decimal::ZERO,
            positions: state.positions.clone(),
        })
    }

    async fn open_orders(&self) -> Result<Vec<Order>> {
        Ok(self.state.lock().unwrap().open.clone())
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        _asset: u32,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.place_calls += 1;
        if state.fail_placements {
            return Err(EngineError::Rejected("mock placement failure".to_string()));
        }
        let oid = state.next_oid;
        state.next_oid += 1;
        state.open.push(Order {
            id: oid,
            symbol: symbol.to_string(),
            side,
            price,
            size,
            filled_size: Decimal::ZERO,
            created_at: Utc::now(),
        });
        Ok(oid)
    }

    async fn cancel_order(&self, _asset: u32, order_id: u64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        let before = state.open.len();
        state.open.retain(|o| o.id != order_id);
        Ok(state.open.len() < before)
    }

    async fn cancel_all_orders(&self, _asset: u32) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.cancel_all_calls += 1;
        let removed = state.open.len();
        state.open.clear();
        Ok(removed)
    }

    async fn asset_index(&self, _symbol: &str) -> Result<u32> {
        Ok(0)
    }

    async fn spot_usdc_balance(&self) -> Result<Decimal> {
        Ok(self.state.lock().unwrap().spot_usdc)
    }

    async fn transfer_spot_to_perps(&self, amount: Decimal) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if amount <= Decimal::ZERO {
            return Err(EngineError::Rejected("non-positive amount".to_string()));
        }
        state.spot_usdc -= amount;
        state.equity += amount;
        state.available += amount;
        state.transfers.push(amount);
        Ok(())
    }
}
