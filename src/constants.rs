//! Central tunable constants for hypergrid.
//!
//! Magic numbers live here so behaviour can be adjusted without touching
//! business logic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

// =============================================================================
// MARKET CONSTANTS
// =============================================================================

/// Smallest allowed price increment for BTC perpetuals.
pub const DEFAULT_TICK_SIZE: Decimal = dec!(0.1);

/// Taker fee fraction used by the profitability model (0.045%).
pub const TAKER_FEE: Decimal = dec!(0.00045);

/// Assumed full grid oscillations per year for the return estimate.
pub const ANNUAL_OSCILLATIONS: u32 = 300;

// =============================================================================
// RISK CONSTANTS
// =============================================================================

/// Fraction of the grid half-range the mid may drift before re-centring.
pub const RECENTER_BAND: Decimal = dec!(0.8);

// =============================================================================
// RUNTIME CONSTANTS
// =============================================================================

/// Per-request HTTP timeout against the exchange.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a spot -> perp transfer before re-reading the account.
pub const TRANSFER_SETTLE_WAIT: Duration = Duration::from_secs(2);

/// Points retained in the status price/PnL histories.
pub const HISTORY_CAPACITY: usize = 120;

/// Fills retained in the status recent-fills buffer.
pub const RECENT_FILLS_CAPACITY: usize = 50;
