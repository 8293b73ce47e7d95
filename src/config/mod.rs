use crate::constants::TAKER_FEE;
use crate::error::{EngineError, Result};
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

pub mod exchange;

pub use exchange::{load_exchange_config, ExchangeConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Perp coin name, e.g. "BTC".
    pub symbol: String,
    /// Expected asset index; re-resolved from exchange metadata at startup.
    pub asset_index: u32,
    pub grid_levels: usize,
    pub grid_spacing_percent: Decimal,
    pub order_size_btc: Decimal,
    pub sync_interval_seconds: u64,
}

impl GridConfig {
    /// Spacing as a fraction (1% -> 0.01).
    pub fn spacing_fraction(&self) -> Decimal {
        self.grid_spacing_percent / Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_position_size_btc: Decimal,
    pub max_drawdown_percent: Decimal,
    pub min_grid_price: Decimal,
    pub max_grid_price: Decimal,
}

pub fn load_config(path: &str) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::Config(format!("cannot read {}: {}", path, e)))?;
    let config: AppConfig =
        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let g = &self.grid;
        if g.symbol.is_empty() {
            return Err(EngineError::Config("symbol must not be empty".to_string()));
        }
        if g.grid_levels < 4 {
            return Err(EngineError::Config(format!(
                "grid_levels {} must be at least 4",
                g.grid_levels
            )));
        }
        if g.grid_spacing_percent <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "grid_spacing_percent {} must be positive",
                g.grid_spacing_percent
            )));
        }
        if g.grid_spacing_percent >= Decimal::ONE_HUNDRED {
            return Err(EngineError::Config(format!(
                "grid_spacing_percent {} must be below 100",
                g.grid_spacing_percent
            )));
        }
        if g.order_size_btc <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "order_size_btc {} must be positive",
                g.order_size_btc
            )));
        }
        if g.sync_interval_seconds == 0 {
            return Err(EngineError::Config(
                "sync_interval_seconds must be at least 1".to_string(),
            ));
        }

        let r = &self.risk;
        if r.max_position_size_btc <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "max_position_size_btc {} must be positive",
                r.max_position_size_btc
            )));
        }
        if r.max_drawdown_percent <= Decimal::ZERO || r.max_drawdown_percent > Decimal::ONE_HUNDRED
        {
            return Err(EngineError::Config(format!(
                "max_drawdown_percent {} must be in (0, 100]",
                r.max_drawdown_percent
            )));
        }
        if r.min_grid_price >= r.max_grid_price {
            return Err(EngineError::Config(format!(
                "min_grid_price {} must be below max_grid_price {}",
                r.min_grid_price, r.max_grid_price
            )));
        }

        // Spacing tighter than the round-trip fee can never be profitable.
        let per_trip = self.grid.spacing_fraction() - TAKER_FEE - TAKER_FEE;
        if per_trip <= Decimal::ZERO {
            warn!(
                "grid_spacing_percent {} does not cover the {}x2 taker fee round-trip; \
                 this grid cannot be profitable",
                self.grid.grid_spacing_percent, TAKER_FEE
            );
        }

        Ok(())
    }
}
