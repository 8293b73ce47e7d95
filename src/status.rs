//! Observer snapshot cache and the read-only status route.
//!
//! Writers replace the whole snapshot under a short-held lock; readers copy
//! out. Histories are bounded FIFOs with drop-oldest semantics.

use crate::constants::{HISTORY_CAPACITY, RECENT_FILLS_CAPACITY};
use crate::grid::GridLevel;
use crate::model::{AccountState, FillRecord};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PnlPoint {
    pub time: DateTime<Utc>,
    pub pnl: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub sync_count: u64,
    pub mid_price: Decimal,
    pub total_equity: Decimal,
    pub available_balance: Decimal,
    pub realized_pnl: Decimal,
    pub active_orders: usize,
    pub filled_levels: usize,
    pub total_fills: usize,
    pub levels: Vec<GridLevel>,
    pub recent_fills: Vec<FillRecord>,
    pub price_history: Vec<PricePoint>,
    pub pnl_history: Vec<PnlPoint>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: StatusSnapshot,
    price_history: VecDeque<PricePoint>,
    pnl_history: VecDeque<PnlPoint>,
    recent_fills: VecDeque<FillRecord>,
    total_fills: usize,
}

#[derive(Debug, Default)]
pub struct StatusCache {
    inner: Mutex<Inner>,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
    if queue.len() >= capacity {
        queue.pop_front();
    }
    queue.push_back(value);
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn publish(
        &self,
        is_running: bool,
        sync_count: u64,
        mid_price: Decimal,
        account: &AccountState,
        levels: &[GridLevel],
        realized_pnl: Decimal,
        new_fills: &[FillRecord],
    ) {
        use crate::grid::LevelStatus;

        let now = Utc::now();
        let mut inner = self.inner.lock().expect("status lock");

        push_bounded(
            &mut inner.price_history,
            PricePoint {
                time: now,
                price: mid_price,
            },
            HISTORY_CAPACITY,
        );
        push_bounded(
            &mut inner.pnl_history,
            PnlPoint {
                time: now,
                pnl: realized_pnl,
            },
            HISTORY_CAPACITY,
        );
        for fill in new_fills {
            push_bounded(&mut inner.recent_fills, fill.clone(), RECENT_FILLS_CAPACITY);
        }
        inner.total_fills += new_fills.len();

        let snapshot = StatusSnapshot {
            is_running,
            sync_count,
            mid_price,
            total_equity: account.total_equity,
            available_balance: account.available_balance,
            realized_pnl,
            active_orders: levels
                .iter()
                .filter(|l| l.status == LevelStatus::Active)
                .count(),
            filled_levels: levels
                .iter()
                .filter(|l| l.status == LevelStatus::Filled)
                .count(),
            total_fills: inner.total_fills,
            levels: levels.to_vec(),
            recent_fills: inner.recent_fills.iter().cloned().collect(),
            price_history: inner.price_history.iter().cloned().collect(),
            pnl_history: inner.pnl_history.iter().cloned().collect(),
        };
        inner.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().expect("status lock").snapshot.clone()
    }
}

async fn status_handler(State(cache): State<Arc<StatusCache>>) -> Json<StatusSnapshot> {
    Json(cache.snapshot())
}

/// Serve `GET /api/status` until the process exits.
pub async fn serve(cache: Arc<StatusCache>, port: u16) -> std::io::Result<()> {
    let app = Router::new()
        .route("/api/status", get(status_handler))
        .with_state(cache);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Status server listening on port {}", port);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;
    use rust_decimal_macros::dec;

    fn account() -> AccountState {
        AccountState {
            total_equity: dec!(10000),
            available_balance: dec!(9500),
            margin_used: dec!(500),
            positions: vec![],
        }
    }

    fn fill(pnl: Decimal) -> FillRecord {
        FillRecord {
            time: Utc::now(),
            side: Side::Sell,
            price: dec!(50500),
            size: dec!(0.001),
            pnl,
        }
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let cache = StatusCache::new();
        cache.publish(true, 1, dec!(50000), &account(), &[], dec!(0), &[]);
        cache.publish(true, 2, dec!(50100), &account(), &[], dec!(0), &[fill(dec!(0.5))]);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.sync_count, 2);
        assert_eq!(snapshot.mid_price, dec!(50100));
        assert_eq!(snapshot.price_history.len(), 2);
        assert_eq!(snapshot.total_fills, 1);
        assert_eq!(snapshot.recent_fills.len(), 1);
    }

    #[test]
    fn test_histories_drop_oldest_at_capacity() {
        let cache = StatusCache::new();
        for i in 0..(HISTORY_CAPACITY + 10) {
            cache.publish(
                true,
                i as u64,
                dec!(50000) + Decimal::from(i as u64),
                &account(),
                &[],
                dec!(0),
                &[],
            );
        }
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.price_history.len(), HISTORY_CAPACITY);
        // Oldest points are gone; the first retained one is point 10.
        assert_eq!(snapshot.price_history[0].price, dec!(50010));
    }

    #[test]
    fn test_recent_fills_capped() {
        let cache = StatusCache::new();
        let fills: Vec<FillRecord> = (0..(RECENT_FILLS_CAPACITY + 5))
            .map(|i| fill(Decimal::from(i as u64)))
            .collect();
        cache.publish(true, 1, dec!(50000), &account(), &[], dec!(0), &fills);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.recent_fills.len(), RECENT_FILLS_CAPACITY);
        assert_eq!(snapshot.total_fills, RECENT_FILLS_CAPACITY + 5);
        assert_eq!(snapshot.recent_fills[0].pnl, dec!(5));
    }
}
