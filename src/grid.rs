//! Pure grid geometry: ladder construction, bounds, counter-level lookup,
//! tick rounding and the a-priori return estimate.
//!
//! Everything here is deterministic and side-effect free; the strategy owns
//! the levels this module produces.

use crate::config::GridConfig;
use crate::constants::{ANNUAL_OSCILLATIONS, DEFAULT_TICK_SIZE, TAKER_FEE};
use crate::error::{EngineError, Result};
use crate::model::Side;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LevelStatus {
    Pending,
    Active,
    Filled,
    Cancelled,
}

/// One rung of the ladder. Levels are created together by [`build_grid`],
/// indexed contiguously from the lowest price upward, and only ever
/// reassigned, never resized.
#[derive(Debug, Clone, Serialize)]
pub struct GridLevel {
    pub index: usize,
    pub price: Decimal,
    pub side: Side,
    pub size: Decimal,
    pub status: LevelStatus,
    pub order_id: Option<u64>,
    pub placed_at: Option<DateTime<Utc>>,
    pub filled_at: Option<DateTime<Utc>>,
    pub realized_pnl: Decimal,
}

/// Round `price` to the nearest multiple of `tick`, ties away from zero.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * tick
}

fn level_price(mid: f64, spacing: f64, index: usize, mid_index: usize) -> Decimal {
    // The one place binary floats are allowed: the geometric power. The
    // result is rounded straight back to tick.
    let ratio = (1.0 + spacing).powi(index as i32 - mid_index as i32);
    let raw = Decimal::from_f64(mid * ratio).unwrap_or(Decimal::ZERO);
    round_to_tick(raw, DEFAULT_TICK_SIZE)
}

/// Build the geometric ladder around `mid_price`.
///
/// Multiplicative spacing is mandatory: additive spacing drifts in log-space
/// and biases the side split after a reset.
pub fn build_grid(mid_price: Decimal, cfg: &GridConfig) -> Result<Vec<GridLevel>> {
    if mid_price <= Decimal::ZERO {
        return Err(EngineError::Config(format!(
            "mid price {} must be positive",
            mid_price
        )));
    }
    if cfg.grid_levels < 2 {
        return Err(EngineError::Config(format!(
            "grid_levels {} must be at least 2",
            cfg.grid_levels
        )));
    }

    let spacing = cfg
        .spacing_fraction()
        .to_f64()
        .ok_or_else(|| EngineError::Config("grid spacing out of range".to_string()))?;
    let mid = mid_price
        .to_f64()
        .ok_or_else(|| EngineError::Config("mid price out of range".to_string()))?;
    let mid_index = cfg.grid_levels / 2;

    let levels = (0..cfg.grid_levels)
        .map(|index| GridLevel {
            index,
            price: level_price(mid, spacing, index, mid_index),
            side: if index < mid_index {
                Side::Buy
            } else {
                Side::Sell
            },
            size: cfg.order_size_btc,
            status: LevelStatus::Pending,
            order_id: None,
            placed_at: None,
            filled_at: None,
            realized_pnl: Decimal::ZERO,
        })
        .collect();

    Ok(levels)
}

/// Lowest and highest ladder prices for `mid_price` under `cfg`.
pub fn grid_bounds(mid_price: Decimal, cfg: &GridConfig) -> Result<(Decimal, Decimal)> {
    if mid_price <= Decimal::ZERO || cfg.grid_levels < 2 {
        return Err(EngineError::Config("degenerate grid bounds".to_string()));
    }
    let spacing = cfg
        .spacing_fraction()
        .to_f64()
        .ok_or_else(|| EngineError::Config("grid spacing out of range".to_string()))?;
    let mid = mid_price
        .to_f64()
        .ok_or_else(|| EngineError::Config("mid price out of range".to_string()))?;
    let mid_index = cfg.grid_levels / 2;
    Ok((
        level_price(mid, spacing, 0, mid_index),
        level_price(mid, spacing, cfg.grid_levels - 1, mid_index),
    ))
}

/// Price of the rung one above a filled buy, if any.
pub fn counter_sell_price(filled_buy_index: usize, levels: &[GridLevel]) -> Option<Decimal> {
    levels.get(filled_buy_index + 1).map(|l| l.price)
}

/// Price of the rung one below a filled sell, if any.
pub fn counter_buy_price(filled_sell_index: usize, levels: &[GridLevel]) -> Option<Decimal> {
    if filled_sell_index == 0 {
        return None;
    }
    levels.get(filled_sell_index - 1).map(|l| l.price)
}

/// Coarse annualised return estimate used to reject loss-making configs.
///
/// Per round-trip the grid earns one spacing and pays the taker fee twice;
/// capital is split across all rungs. Returns zero on degenerate input or
/// when the spacing does not cover the fees.
pub fn estimated_annual_return(mid_price: Decimal, cfg: &GridConfig) -> Decimal {
    if mid_price <= Decimal::ZERO || cfg.grid_levels == 0 || cfg.order_size_btc <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let per_trip = cfg.spacing_fraction() - TAKER_FEE - TAKER_FEE;
    if per_trip <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    Decimal::from(ANNUAL_OSCILLATIONS) * per_trip / Decimal::from(cfg.grid_levels as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_config(levels: usize, spacing_percent: Decimal) -> GridConfig {
        GridConfig {
            symbol: "BTC".to_string(),
            asset_index: 0,
            grid_levels: levels,
            grid_spacing_percent: spacing_percent,
            order_size_btc: dec!(0.001),
            sync_interval_seconds: 10,
        }
    }

    #[test]
    fn test_build_grid_level_count() {
        let cfg = test_config(10, dec!(1));
        let levels = build_grid(dec!(50000), &cfg).unwrap();
        assert_eq!(levels.len(), 10);
    }

    #[test]
    fn test_build_grid_rejects_bad_input() {
        let cfg = test_config(10, dec!(1));
        assert!(build_grid(dec!(0), &cfg).is_err());
        assert!(build_grid(dec!(-1), &cfg).is_err());

        let tiny = test_config(1, dec!(1));
        assert!(build_grid(dec!(50000), &tiny).is_err());
    }

    #[test]
    fn test_prices_strictly_ascending_with_geometric_ratio() {
        let cfg = test_config(20, dec!(1));
        let levels = build_grid(dec!(50000), &cfg).unwrap();
        let expected = dec!(1.01);
        for pair in levels.windows(2) {
            assert!(pair[1].price > pair[0].price);
            let ratio = pair[1].price / pair[0].price;
            // Tick-rounding slack around the exact geometric ratio.
            assert!(ratio >= expected * dec!(0.999), "ratio {} too low", ratio);
            assert!(ratio <= expected * dec!(1.001), "ratio {} too high", ratio);
        }
    }

    #[test]
    fn test_side_split_at_mid_index() {
        let cfg = test_config(10, dec!(1));
        let levels = build_grid(dec!(50000), &cfg).unwrap();
        for level in &levels {
            if level.index < 5 {
                assert_eq!(level.side, Side::Buy);
            } else {
                assert_eq!(level.side, Side::Sell);
            }
        }
    }

    #[test]
    fn test_levels_start_pending_with_configured_size() {
        let cfg = test_config(8, dec!(0.5));
        let levels = build_grid(dec!(50000), &cfg).unwrap();
        for level in &levels {
            assert_eq!(level.status, LevelStatus::Pending);
            assert_eq!(level.size, dec!(0.001));
            assert!(level.order_id.is_none());
            assert_eq!(level.realized_pnl, dec!(0));
        }
    }

    #[test]
    fn test_grid_bounds_straddle_mid() {
        let cfg = test_config(10, dec!(1));
        let mid = dec!(50000);
        let (lower, upper) = grid_bounds(mid, &cfg).unwrap();
        assert!(lower < mid);
        assert!(mid < upper);

        let levels = build_grid(mid, &cfg).unwrap();
        assert_eq!(levels.first().unwrap().price, lower);
        assert_eq!(levels.last().unwrap().price, upper);
    }

    #[test]
    fn test_counter_lookups() {
        let cfg = test_config(10, dec!(1));
        let levels = build_grid(dec!(50000), &cfg).unwrap();

        assert_eq!(counter_sell_price(9, &levels), None);
        assert_eq!(counter_buy_price(0, &levels), None);
        assert_eq!(counter_sell_price(3, &levels), Some(levels[4].price));
        assert_eq!(counter_buy_price(7, &levels), Some(levels[6].price));
    }

    #[test]
    fn test_round_to_tick_midpoint_away_from_zero() {
        assert_eq!(round_to_tick(dec!(0.25), dec!(0.1)), dec!(0.3));
        assert_eq!(round_to_tick(dec!(-0.25), dec!(0.1)), dec!(-0.3));
        assert_eq!(round_to_tick(dec!(50000.04), dec!(0.1)), dec!(50000.0));
        assert_eq!(round_to_tick(dec!(50000.05), dec!(0.1)), dec!(50000.1));
        assert_eq!(round_to_tick(dec!(123.456), dec!(0.5)), dec!(123.5));
    }

    #[test]
    fn test_return_estimate_degenerate_inputs() {
        let cfg = test_config(10, dec!(1));
        assert_eq!(estimated_annual_return(dec!(0), &cfg), dec!(0));

        let mut zero_size = test_config(10, dec!(1));
        zero_size.order_size_btc = dec!(0);
        assert_eq!(estimated_annual_return(dec!(50000), &zero_size), dec!(0));
    }

    #[test]
    fn test_return_estimate_rejects_fee_dominated_spacing() {
        // 0.05% spacing < 2 x 0.045% fees.
        let cfg = test_config(10, dec!(0.05));
        assert!(estimated_annual_return(dec!(50000), &cfg) <= dec!(0));
    }

    #[test]
    fn test_return_estimate_normal_case() {
        let cfg = test_config(10, dec!(1));
        // 300 * (0.01 - 0.0009) / 10 = 0.273
        assert_eq!(estimated_annual_return(dec!(50000), &cfg), dec!(0.273));
    }
}
