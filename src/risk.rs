//! Sampled risk guard. One piece of state (the equity high-water mark),
//! one verdict per tick.

use crate::config::RiskConfig;
use crate::constants::RECENTER_BAND;
use crate::model::{AccountState, MarketData};
use rust_decimal::Decimal;

/// Outcome of one risk evaluation. Consumers branch exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskVerdict {
    Continue,
    ResetGrid(String),
    Halt(String),
}

pub struct RiskManager {
    cfg: RiskConfig,
    symbol: String,
    peak_equity: Decimal,
}

impl RiskManager {
    pub fn new(cfg: RiskConfig, symbol: String) -> Self {
        Self {
            cfg,
            symbol,
            peak_equity: Decimal::ZERO,
        }
    }

    pub fn set_initial_equity(&mut self, equity: Decimal) {
        self.peak_equity = equity;
    }

    pub fn peak_equity(&self) -> Decimal {
        self.peak_equity
    }

    /// Evaluate the guards in fixed order: drawdown, price range, net
    /// position. The first trigger wins; later guards are not reported in
    /// the same cycle.
    pub fn evaluate(&mut self, account: &AccountState, market: &MarketData) -> RiskVerdict {
        if account.total_equity > self.peak_equity {
            self.peak_equity = account.total_equity;
        }

        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - account.total_equity) / self.peak_equity;
            let limit = self.cfg.max_drawdown_percent / Decimal::ONE_HUNDRED;
            if drawdown >= limit {
                return RiskVerdict::Halt(format!(
                    "drawdown {:.2}% breached limit {}% (peak {}, equity {})",
                    drawdown * Decimal::ONE_HUNDRED,
                    self.cfg.max_drawdown_percent,
                    self.peak_equity,
                    account.total_equity
                ));
            }
        }

        // Boundary values are inclusive: at-boundary passes.
        if market.mid_price < self.cfg.min_grid_price || market.mid_price > self.cfg.max_grid_price
        {
            return RiskVerdict::Halt(format!(
                "mid price {} outside [{}, {}]",
                market.mid_price, self.cfg.min_grid_price, self.cfg.max_grid_price
            ));
        }

        let net = account.net_position(&self.symbol);
        if net.abs() > self.cfg.max_position_size_btc {
            return RiskVerdict::ResetGrid(format!(
                "net position {} exceeds cap {}",
                net, self.cfg.max_position_size_btc
            ));
        }

        RiskVerdict::Continue
    }
}

/// True when the mid has drifted beyond 80% of the grid half-range from
/// centre. The band prevents thrashing at the edge while still re-centring
/// before the resting orders become useless.
pub fn should_reset_grid(current_price: Decimal, lower: Decimal, upper: Decimal) -> bool {
    let centre = (lower + upper) / Decimal::TWO;
    let half_range = (upper - lower) / Decimal::TWO;
    (current_price - centre).abs() > RECENTER_BAND * half_range
}
