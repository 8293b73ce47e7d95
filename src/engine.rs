//! Orchestrator: init -> fetch -> risk -> act -> sleep, one tick at a time.
//!
//! Failures inside a tick are logged and absorbed; only cancellation ends
//! the loop. Shutdown deliberately leaves resting orders on the book since
//! the exchange retains them across restarts.

use crate::config::AppConfig;
use crate::constants::TRANSFER_SETTLE_WAIT;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::risk::{self, RiskManager, RiskVerdict};
use crate::status::StatusCache;
use crate::strategy::GridStrategy;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Engine {
    cfg: AppConfig,
    client: Arc<dyn ExchangeClient>,
    strategy: GridStrategy,
    risk: RiskManager,
    status: Arc<StatusCache>,
    asset: u32,
    sync_count: u64,
    halted: bool,
    grid_lower: Decimal,
    grid_upper: Decimal,
}

impl Engine {
    pub fn new(cfg: AppConfig, client: Arc<dyn ExchangeClient>, status: Arc<StatusCache>) -> Self {
        let strategy = GridStrategy::new(cfg.grid.clone(), client.clone());
        let risk = RiskManager::new(cfg.risk.clone(), cfg.grid.symbol.clone());
        let asset = cfg.grid.asset_index;
        Self {
            cfg,
            client,
            strategy,
            risk,
            status,
            asset,
            sync_count: 0,
            halted: false,
            grid_lower: Decimal::ZERO,
            grid_upper: Decimal::ZERO,
        }
    }

    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        self.bootstrap().await?;

        let interval = Duration::from_secs(self.cfg.grid.sync_interval_seconds);
        info!(
            "Engine started for {}: syncing every {}s",
            self.cfg.grid.symbol, self.cfg.grid.sync_interval_seconds
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested; resting orders stay on the book");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        error!("Sync #{} failed: {}; continuing", self.sync_count, e);
                    }
                }
            }
        }

        Ok(())
    }

    async fn bootstrap(&mut self) -> Result<()> {
        let symbol = self.cfg.grid.symbol.clone();

        match self.client.asset_index(&symbol).await {
            Ok(index) => {
                if index != self.cfg.grid.asset_index {
                    warn!(
                        "Asset index for {} is {} on the exchange, config said {}",
                        symbol, index, self.cfg.grid.asset_index
                    );
                }
                self.asset = index;
            }
            Err(e) => {
                warn!(
                    "Could not resolve asset index for {}: {}; using configured {}",
                    symbol, e, self.cfg.grid.asset_index
                );
                self.asset = self.cfg.grid.asset_index;
            }
        }
        self.strategy.set_asset_index(self.asset);

        let mut account = self.client.account_state().await?;
        if account.total_equity <= Decimal::ZERO {
            let spot = self.client.spot_usdc_balance().await?;
            if spot > Decimal::ZERO {
                info!("Perp account empty; sweeping {} USDC from spot", spot);
                self.client.transfer_spot_to_perps(spot).await?;
                // The balance moves asynchronously at the exchange.
                tokio::time::sleep(TRANSFER_SETTLE_WAIT).await;
                account = self.client.account_state().await?;
            }
        }

        self.risk.set_initial_equity(account.total_equity);
        self.strategy.initialize(account.total_equity).await?;
        self.refresh_bounds();
        Ok(())
    }

    fn refresh_bounds(&mut self) {
        if let Some((lower, upper)) = self.strategy.bounds() {
            self.grid_lower = lower;
            self.grid_upper = upper;
            info!("Grid bounds [{}, {}]", lower, upper);
        }
    }

    async fn tick(&mut self) -> Result<()> {
        self.sync_count += 1;

        let market = self.client.market_data(&self.cfg.grid.symbol).await?;
        let account = self.client.account_state().await?;

        let verdict = self.risk.evaluate(&account, &market);
        match verdict {
            RiskVerdict::Halt(reason) => {
                if !self.halted {
                    error!("[RISK] HALT: {}", reason);
                    let removed = self.client.cancel_all_orders(self.asset).await?;
                    error!("[RISK] Cancelled {} resting orders", removed);
                    self.halted = true;
                } else {
                    debug!("[RISK] Still halted: {}", reason);
                }
            }
            RiskVerdict::ResetGrid(reason) => {
                warn!("[RISK] Grid reset: {}", reason);
                self.halted = false;
                self.strategy.reset().await?;
                self.refresh_bounds();
            }
            RiskVerdict::Continue => {
                if self.halted {
                    info!("[RISK] Conditions cleared; resuming");
                    self.halted = false;
                }
                if risk::should_reset_grid(market.mid_price, self.grid_lower, self.grid_upper) {
                    info!(
                        "Mid {} drifted outside the re-centre band of [{}, {}]",
                        market.mid_price, self.grid_lower, self.grid_upper
                    );
                    self.strategy.reset().await?;
                    self.refresh_bounds();
                } else {
                    self.strategy.sync().await?;
                }
            }
        }

        let fills = self.strategy.drain_new_fills();
        self.status.publish(
            !self.halted,
            self.sync_count,
            market.mid_price,
            &account,
            self.strategy.levels(),
            self.strategy.realized_pnl(),
            &fills,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridConfig, RiskConfig};
    use crate::exchange::MockExchange;
    use crate::grid::LevelStatus;
    use rust_decimal_macros::dec;

    fn test_config() -> AppConfig {
        AppConfig {
            grid: GridConfig {
                symbol: "BTC".to_string(),
                asset_index: 0,
                grid_levels: 10,
                grid_spacing_percent: dec!(1),
                order_size_btc: dec!(0.001),
                sync_interval_seconds: 1,
            },
            risk: RiskConfig {
                max_position_size_btc: dec!(0.01),
                max_drawdown_percent: dec!(10),
                min_grid_price: dec!(10000),
                max_grid_price: dec!(150000),
            },
        }
    }

    fn create_engine(mid: Decimal, equity: Decimal) -> (Engine, Arc<MockExchange>) {
        let exchange = Arc::new(MockExchange::new(mid, equity));
        let engine = Engine::new(
            test_config(),
            exchange.clone(),
            Arc::new(StatusCache::new()),
        );
        (engine, exchange)
    }

    #[tokio::test]
    async fn test_halt_cancels_and_places_nothing() {
        // Mid far below min_grid_price: the first tick must halt, cancel
        // resting orders, and place nothing.
        let (mut engine, exchange) = create_engine(dec!(1000), dec!(10000));
        engine.bootstrap().await.unwrap();

        let cancels_before = exchange.cancel_all_calls();
        let places_before = exchange.place_calls();

        engine.tick().await.unwrap();

        assert!(exchange.cancel_all_calls() > cancels_before);
        assert_eq!(exchange.place_calls(), places_before);
        assert!(exchange.resting_orders().is_empty());
        assert!(!engine.status.snapshot().is_running);
    }

    #[tokio::test]
    async fn test_halt_holds_without_repeated_cancels() {
        let (mut engine, exchange) = create_engine(dec!(1000), dec!(10000));
        engine.bootstrap().await.unwrap();

        engine.tick().await.unwrap();
        let cancels_after_halt = exchange.cancel_all_calls();
        engine.tick().await.unwrap();
        assert_eq!(exchange.cancel_all_calls(), cancels_after_halt);
    }

    #[tokio::test]
    async fn test_drift_recentres_grid() {
        let (mut engine, exchange) = create_engine(dec!(50000), dec!(10000));
        engine.bootstrap().await.unwrap();
        let (lower_before, upper_before) = (engine.grid_lower, engine.grid_upper);

        exchange.set_mid_price(dec!(55000));
        engine.tick().await.unwrap();

        assert!(engine.grid_lower > lower_before);
        assert!(engine.grid_upper > upper_before);
        let centre = (engine.grid_lower + engine.grid_upper) / Decimal::TWO;
        assert!((centre - dec!(55000)).abs() < dec!(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_sweeps_spot_into_empty_perp_account() {
        let (mut engine, exchange) = create_engine(dec!(50000), dec!(0));
        exchange.set_spot_usdc(dec!(500));

        engine.bootstrap().await.unwrap();

        assert_eq!(exchange.transfers(), vec![dec!(500)]);
        assert_eq!(engine.risk.peak_equity(), dec!(500));
        assert!(engine.strategy.is_initialized());
    }

    #[tokio::test]
    async fn test_tick_publishes_fills_to_status() {
        let (mut engine, exchange) = create_engine(dec!(50000), dec!(10000));
        engine.bootstrap().await.unwrap();

        // Fill the buy nearest mid, then tick.
        let oid = engine.strategy.levels()[4].order_id.unwrap();
        exchange.remove_order(oid).unwrap();
        engine.tick().await.unwrap();

        let snapshot = engine.status.snapshot();
        assert!(snapshot.is_running);
        assert_eq!(snapshot.sync_count, 1);
        assert_eq!(snapshot.total_fills, 1);
        assert_eq!(
            snapshot
                .levels
                .iter()
                .filter(|l| l.status == LevelStatus::Filled)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_position_breach_resets_grid() {
        use crate::model::Position;
        let (mut engine, exchange) = create_engine(dec!(50000), dec!(10000));
        engine.bootstrap().await.unwrap();

        exchange.set_positions(vec![Position {
            symbol: "BTC".to_string(),
            size: dec!(0.05),
            entry_price: dec!(50000),
            unrealized_pnl: dec!(0),
        }]);
        let cancel_alls_before = exchange.cancel_all_calls();

        engine.tick().await.unwrap();

        // Reset rebuilds via initialize, which clears the book first.
        assert!(exchange.cancel_all_calls() > cancel_alls_before);
        assert!(engine.strategy.is_initialized());
        assert!(engine.status.snapshot().is_running);
    }
}
