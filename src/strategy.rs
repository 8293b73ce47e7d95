//! Stateful grid lifecycle manager.
//!
//! The strategy exclusively owns the level collection. Fills are detected by
//! diffing the exchange's open-orders snapshot against the order ids tracked
//! locally; each fill reposts a counter order one rung away and attributes
//! realized PnL when a sell closes the round-trip.

use crate::config::GridConfig;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::grid::{self, GridLevel, LevelStatus};
use crate::model::{FillRecord, Side};
use chrono::Utc;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

pub struct GridStrategy {
    cfg: GridConfig,
    client: Arc<dyn ExchangeClient>,
    asset: u32,
    levels: Vec<GridLevel>,
    initialized: bool,
    new_fills: Vec<FillRecord>,
}

impl GridStrategy {
    pub fn new(cfg: GridConfig, client: Arc<dyn ExchangeClient>) -> Self {
        let asset = cfg.asset_index;
        Self {
            cfg,
            client,
            asset,
            levels: Vec::new(),
            initialized: false,
            new_fills: Vec::new(),
        }
    }

    /// Override the asset index resolved from exchange metadata.
    pub fn set_asset_index(&mut self, asset: u32) {
        self.asset = asset;
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.levels.iter().map(|l| l.realized_pnl).sum()
    }

    /// Lowest and highest ladder prices of the current grid.
    pub fn bounds(&self) -> Option<(Decimal, Decimal)> {
        match (self.levels.first(), self.levels.last()) {
            (Some(lo), Some(hi)) => Some((lo.price, hi.price)),
            _ => None,
        }
    }

    /// Return and clear the fills detected since the last drain.
    pub fn drain_new_fills(&mut self) -> Vec<FillRecord> {
        std::mem::take(&mut self.new_fills)
    }

    /// Build the ladder around the current mid and place all resting orders
    /// except the single rung straddling mid, which sits inside the bid-ask
    /// spread and would immediately cross.
    pub async fn initialize(&mut self, initial_equity: Decimal) -> Result<()> {
        let removed = self.client.cancel_all_orders(self.asset).await?;
        info!("[GRID] Cleared {} resting orders before building", removed);

        let market = self.client.market_data(&self.cfg.symbol).await?;
        let mid = market.mid_price;
        self.levels = grid::build_grid(mid, &self.cfg)?;

        let estimate = grid::estimated_annual_return(mid, &self.cfg);
        if estimate <= Decimal::ZERO {
            warn!("[GRID] Spacing does not cover the fee round-trip; trading at a loss");
        } else {
            info!(
                "[GRID] Estimated annualised return {:.2}%",
                estimate * Decimal::ONE_HUNDRED
            );
        }

        let half_step = mid * self.cfg.spacing_fraction() / Decimal::TWO;
        for index in 0..self.levels.len() {
            if (self.levels[index].price - mid).abs() >= half_step {
                self.try_place(index).await;
            } else {
                debug!(
                    "[GRID] Level {} @ {} straddles mid {}, leaving unplaced",
                    index, self.levels[index].price, mid
                );
            }
        }

        self.initialized = true;
        info!(
            "[GRID] Grid live around {}: {} levels, equity {}",
            mid,
            self.levels.len(),
            initial_equity
        );
        Ok(())
    }

    /// Detect fills by diffing live order ids against the tracked ones, then
    /// retry placement for anything still pending.
    pub async fn sync(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }

        let live = self.client.open_orders().await?;
        let live_ids: HashSet<u64> = live.iter().map(|o| o.id).collect();

        // Snapshot active ids before any side effects: counter orders placed
        // below acquire fresh ids absent from live_ids and must not be
        // classified as filled in the same pass.
        let active: Vec<(usize, u64)> = self
            .levels
            .iter()
            .filter(|l| l.status == LevelStatus::Active)
            .filter_map(|l| l.order_id.map(|oid| (l.index, oid)))
            .collect();

        for (index, oid) in active {
            if !live_ids.contains(&oid) {
                self.handle_fill(index).await;
            }
        }

        for index in 0..self.levels.len() {
            if self.levels[index].status == LevelStatus::Pending {
                self.try_place(index).await;
            }
        }

        Ok(())
    }

    /// Discard the grid and rebuild around the current mid with freshly
    /// fetched equity. A failed fetch aborts the reset; the next tick retries.
    pub async fn reset(&mut self) -> Result<()> {
        info!("[GRID] Rebuilding grid around current mid");
        self.initialized = false;
        let account = self.client.account_state().await?;
        self.initialize(account.total_equity).await
    }

    async fn try_place(&mut self, index: usize) {
        let (side, price, size) = {
            let level = &self.levels[index];
            (level.side, level.price, level.size)
        };

        match self
            .client
            .place_limit_order(&self.cfg.symbol, self.asset, side, price, size)
            .await
        {
            Ok(oid) => {
                let level = &mut self.levels[index];
                level.status = LevelStatus::Active;
                level.order_id = Some(oid);
                level.placed_at = Some(Utc::now());
                debug!("[GRID] Level {} {} {} @ {} resting as oid {}", index, side, size, price, oid);
            }
            Err(e) => {
                warn!(
                    "[GRID] Placement failed for level {} {} @ {}: {}; retrying next sync",
                    index, side, price, e
                );
            }
        }
    }

    async fn handle_fill(&mut self, index: usize) {
        let now = Utc::now();
        let (side, price, size) = {
            let level = &mut self.levels[index];
            level.status = LevelStatus::Filled;
            level.filled_at = Some(now);
            level.order_id = None;
            (level.side, level.price, level.size)
        };

        match side {
            Side::Buy => {
                // Profit is only realised when the matching sell closes the
                // round-trip; the buy leg records zero.
                info!("[GRID] Level {} BUY {} filled @ {}", index, size, price);
                self.new_fills.push(FillRecord {
                    time: now,
                    side,
                    price,
                    size,
                    pnl: Decimal::ZERO,
                });
                let counter = index + 1;
                if counter < self.levels.len() {
                    self.flip_counter(counter, Side::Sell).await;
                }
            }
            Side::Sell => {
                let pnl = match grid::counter_buy_price(index, &self.levels) {
                    Some(buy_price) => (price - buy_price) * size,
                    None => Decimal::ZERO,
                };
                self.levels[index].realized_pnl += pnl;
                info!(
                    "[GRID] Level {} SELL {} filled @ {} | round-trip pnl {}",
                    index, size, price, pnl
                );
                self.new_fills.push(FillRecord {
                    time: now,
                    side,
                    price,
                    size,
                    pnl,
                });
                if index > 0 {
                    self.flip_counter(index - 1, Side::Buy).await;
                }
            }
        }
    }

    /// Rewrite a counter rung to `side` and repost it. A rung still resting
    /// on the opposite side gets its stale order cancelled first so duplicate
    /// resting orders cannot accumulate.
    async fn flip_counter(&mut self, index: usize, side: Side) {
        let (status, current_side, order_id) = {
            let level = &self.levels[index];
            (level.status, level.side, level.order_id)
        };

        if status == LevelStatus::Active {
            if current_side == side {
                return;
            }
            if let Some(oid) = order_id {
                match self.client.cancel_order(self.asset, oid).await {
                    Ok(true) => debug!("[GRID] Cancelled stale oid {} on level {}", oid, index),
                    Ok(false) => warn!(
                        "[GRID] Exchange did not confirm cancel of stale oid {} on level {}",
                        oid, index
                    ),
                    Err(e) => warn!(
                        "[GRID] Cancel of stale oid {} on level {} failed: {}",
                        oid, index, e
                    ),
                }
            }
        }

        let level = &mut self.levels[index];
        level.side = side;
        level.status = LevelStatus::Pending;
        level.order_id = None;
        self.try_place(index).await;
    }
}
