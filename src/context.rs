//! `CoreContext`: the single entry point a binary wires up and calls
//! (spec.md §6 "Request surface"). Owns every shared service and enforces
//! the symbol → account → journal lock-acquisition order described in
//! spec.md §5 by construction: callers only ever reach `PositionManager` or
//! `JournalWriter` through a `MatchingEngine` method that already holds the
//! relevant symbol lock.
//!
//! Grounded in the teacher's `AppState` (`main.rs`), trimmed to the
//! synchronous core and stripped of the HTTP/WebSocket layer it also wires.

use crate::catalog::{ProductCatalog, SymbolInfo};
use crate::engine::MatchingEngine;
use crate::error::CoreError;
use crate::journal::snapshot::{write_snapshot, SnapshotData};
use crate::journal::{EventBody, JournalWriter};
use crate::order::{Order, OrderType};
use crate::orderbook::DepthSnapshot;
use crate::position::adl::AdlEngine;
use crate::position::funding::FundingEngine;
use crate::position::insurance::InsuranceFundStore;
use crate::position::{Account, Position, PositionManager};
use crate::primitives::{now_ns, IdGenerator, Side};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct CoreContext {
    pub catalog: Arc<ProductCatalog>,
    pub positions: Arc<PositionManager>,
    pub journal: Arc<JournalWriter>,
    pub engine: Arc<MatchingEngine>,
    pub insurance: Arc<InsuranceFundStore>,
    pub funding: Arc<FundingEngine>,
    pub adl: Arc<AdlEngine>,
    event_ids: IdGenerator,
}

impl CoreContext {
    pub fn new(catalog: ProductCatalog, journal: JournalWriter) -> Self {
        let catalog = Arc::new(catalog);
        let positions = Arc::new(PositionManager::new());
        let journal = Arc::new(journal);
        let engine = Arc::new(MatchingEngine::new(catalog.clone(), positions.clone(), journal.clone()));
        Self {
            catalog,
            positions,
            journal,
            engine,
            insurance: Arc::new(InsuranceFundStore::new()),
            funding: Arc::new(FundingEngine::new()),
            adl: Arc::new(AdlEngine::new()),
            event_ids: IdGenerator::new(1),
        }
    }

    pub fn add_symbol(&self, info: SymbolInfo) {
        self.catalog.insert(info);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &self,
        symbol: &str,
        user: &str,
        side: Side,
        order_type: OrderType,
        price: i64,
        stop_price: Option<i64>,
        qty: f64,
        reduce_only: bool,
        client_order_id: Option<String>,
    ) -> Result<crate::engine::SubmitOutcome, CoreError> {
        self.engine.submit_order(symbol, user, side, order_type, price, stop_price, qty, reduce_only, client_order_id)
    }

    pub fn cancel_order(&self, symbol: &str, order_id: u64, user: &str) -> Result<Order, CoreError> {
        self.engine.cancel_order(symbol, order_id, user)
    }

    pub fn modify_order(&self, symbol: &str, order_id: u64, user: &str, new_price: Option<i64>, new_qty: Option<f64>) -> Result<bool, CoreError> {
        self.engine.modify_order(symbol, order_id, user, new_price, new_qty)
    }

    pub fn get_order(&self, symbol: &str, order_id: u64) -> Option<Order> {
        self.engine.get_order(symbol, order_id)
    }

    pub fn get_user_orders(&self, symbol: &str, user: &str) -> Vec<Order> {
        self.engine.get_user_orders(symbol, user)
    }

    pub fn get_bbo(&self, symbol: &str) -> Option<(Option<i64>, Option<i64>)> {
        self.engine.get_bbo(symbol)
    }

    pub fn get_depth(&self, symbol: &str, n: usize) -> Option<DepthSnapshot> {
        self.engine.get_depth(symbol, n)
    }

    /// Takes the engine's trade-publish channel for an external consumer
    /// (market-data fan-out, WS gateway) to drain.
    pub fn subscribe_trades(&self) -> Option<crossbeam::channel::Receiver<crate::trade::Trade>> {
        self.engine.subscribe_trades()
    }

    pub fn deposit(&self, user: &str, amount: f64) -> Result<(), CoreError> {
        self.positions.deposit(user, amount);
        self.journal
            .append(now_ns(), &EventBody::Deposit { user: user.to_string(), currency: "USD".to_string(), amount })
            .map_err(|e| CoreError::Durability(e.to_string()))?;
        Ok(())
    }

    pub fn withdraw(&self, user: &str, amount: f64) -> Result<(), CoreError> {
        if !self.positions.withdraw(user, amount) {
            return Err(CoreError::InsufficientMargin { available: self.positions.available_margin(user), required: amount });
        }
        self.journal
            .append(now_ns(), &EventBody::Withdrawal { user: user.to_string(), currency: "USD".to_string(), amount })
            .map_err(|e| CoreError::Durability(e.to_string()))?;
        Ok(())
    }

    pub fn get_account(&self, user: &str) -> Account {
        self.positions.account(user)
    }

    pub fn get_position(&self, user: &str, symbol: &str) -> Option<Position> {
        self.positions.position(user, symbol)
    }

    /// Marks a symbol to `mark_price` and liquidates any position whose
    /// maintenance threshold has been crossed (spec.md §4.3 "Liquidation").
    /// Returns the users force-closed.
    pub fn mark_to_market_and_liquidate(&self, symbol: &str, mark_price: i64) -> Result<Vec<String>, CoreError> {
        let info = self.catalog.get(symbol).ok_or_else(|| CoreError::InvalidSymbol(symbol.to_string()))?;
        self.catalog.update_mark_price(symbol, mark_price);
        self.positions.mark_to_market(symbol, mark_price, info.maintenance_margin_ratio);

        let mut liquidated = Vec::new();
        for position in self.positions.positions_for_symbol(symbol) {
            if self.positions.check_liquidation(&position.user, symbol, mark_price, info.maintenance_margin_ratio) {
                let shortfall = self.positions.force_close(&position.user, symbol, mark_price)?;
                let draw = if shortfall > 0.0 { self.insurance.draw(symbol, shortfall) } else { 0.0 };
                self.insurance.record_liquidation(crate::position::insurance::LiquidationRecord {
                    id: self.event_ids.next(),
                    user: position.user.clone(),
                    symbol: symbol.to_string(),
                    size: position.size,
                    price: mark_price,
                    realized_pnl: position.realized_pnl,
                    insurance_draw: draw,
                    timestamp: now_ns(),
                });
                self.journal
                    .append(now_ns(), &EventBody::Liquidation {
                        user: position.user.clone(),
                        symbol: symbol.to_string(),
                        size: position.size,
                        price: mark_price,
                        realized_pnl: position.realized_pnl,
                        insurance_draw: draw,
                    })
                    .map_err(|e| CoreError::Durability(e.to_string()))?;
                tracing::info!(user = %position.user, symbol, price = mark_price, draw, "position liquidated");
                liquidated.push(position.user);
            }
        }
        Ok(liquidated)
    }

    /// Spawns a background task that flushes the journal on an interval,
    /// the way the teacher's persistence worker batches non-critical
    /// writes off the hot path (spec.md §4.4's 50ms batch window).
    pub fn spawn_flush_worker(&self, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let journal = self.journal.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = journal.flush() {
                    tracing::warn!(%err, "background journal flush failed");
                }
            }
        })
    }

    /// Runs an 8-hour funding settlement for `symbol` at `rate` against
    /// `mark_price` (spec.md's funding supplement; see SPEC_FULL.md).
    pub fn settle_funding(&self, symbol: &str, rate: f64, mark_price: i64) -> Result<(), CoreError> {
        self.funding.set_rate(symbol, rate, now_ns());
        self.funding.settle(&self.positions, symbol, rate, mark_price, now_ns());
        self.journal
            .append(now_ns(), &EventBody::Funding { symbol: symbol.to_string(), rate })
            .map_err(|e| CoreError::Durability(e.to_string()))
    }

    /// Writes a consistent checkpoint to `snapshot_dir` and journals a
    /// `SNAPSHOT` event referencing it (spec.md §4.4 "Snapshots"). Returns
    /// the snapshot's sequence and file path; recovery resumes replay from
    /// `sequence + 1`.
    pub fn take_snapshot(&self, snapshot_dir: &Path) -> Result<(u64, PathBuf), CoreError> {
        let sequence = self.journal.last_sequence();
        let data = SnapshotData {
            sequence,
            created_at: chrono::Utc::now(),
            positions: self.positions.all_positions(),
            accounts: self.positions.all_accounts(),
            open_orders: self.engine.all_open_orders(),
        };
        let path = snapshot_dir.join(format!("snapshot-{sequence}.bin"));
        let content_hash = write_snapshot(&path, &data).map_err(|e| CoreError::Durability(e.to_string()))?;
        self.journal
            .append(now_ns(), &EventBody::Snapshot { sequence, path: path.display().to_string(), content_hash })
            .map_err(|e| CoreError::Durability(e.to_string()))?;
        Ok((sequence, path))
    }

    /// Reduces the top-ranked opposite-side positions by `qty` via
    /// auto-deleveraging (spec.md's ADL supplement; see SPEC_FULL.md).
    /// `side` names the side of the book being deleveraged: shorts get
    /// reduced when longs are being liquidated and need counterparties, and
    /// vice versa.
    pub fn run_adl(&self, symbol: &str, side: Side, qty: f64, price: i64) -> crate::position::adl::AdlEvent {
        let side_name = match side {
            Side::Buy => "long",
            Side::Sell => "short",
        };
        let now = now_ns();
        self.adl.reduce_top(&self.positions, symbol, side_name, qty, price, now, || self.event_ids.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SymbolInfo;
    use tempfile::tempdir;

    fn context() -> (CoreContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let catalog = ProductCatalog::with_symbols([SymbolInfo::new("SYM", 1_000_000, 0.001, 1000.0, 10)]);
        let journal = JournalWriter::open(dir.path().join("events.journal")).unwrap();
        (CoreContext::new(catalog, journal), dir)
    }

    #[test]
    fn deposit_then_submit_order_updates_position() {
        let (ctx, _dir) = context();
        ctx.deposit("alice", 1_000_000_000.0).unwrap();
        ctx.deposit("bob", 1_000_000_000.0).unwrap();
        ctx.submit_order("SYM", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 2.0, false, None).unwrap();
        let outcome = ctx.submit_order("SYM", "alice", Side::Buy, OrderType::Market, 0, None, 2.0, false, None).unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(ctx.get_position("alice", "SYM").unwrap().size, 2.0);
    }

    #[tokio::test]
    async fn flush_worker_flushes_without_panicking() {
        let (ctx, _dir) = context();
        let handle = ctx.spawn_flush_worker(std::time::Duration::from_millis(5));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.abort();
        tokio_test::assert_ok!(ctx.journal.flush());
    }

    #[test]
    fn take_snapshot_captures_open_orders_and_positions() {
        let (ctx, dir) = context();
        ctx.deposit("alice", 1_000_000_000.0).unwrap();
        ctx.deposit("bob", 1_000_000_000.0).unwrap();
        ctx.submit_order("SYM", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 5.0, false, None).unwrap();
        ctx.submit_order("SYM", "alice", Side::Buy, OrderType::Market, 0, None, 2.0, false, None).unwrap();

        let (sequence, path) = ctx.take_snapshot(dir.path()).unwrap();
        assert!(sequence > 0);
        let data = crate::journal::snapshot::read_snapshot(&path).unwrap();
        assert_eq!(data.sequence, sequence);
        assert_eq!(data.open_orders.len(), 1);
        assert!(data.positions.iter().any(|p| p.user == "alice" && p.size == 2.0));
    }

    #[test]
    fn liquidation_closes_position_when_mark_crosses_threshold() {
        let (ctx, _dir) = context();
        ctx.deposit("alice", 1_000_000_000.0).unwrap();
        ctx.deposit("bob", 1_000_000_000.0).unwrap();
        ctx.submit_order("SYM", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 2.0, false, None).unwrap();
        ctx.submit_order("SYM", "alice", Side::Buy, OrderType::Market, 0, None, 2.0, false, None).unwrap();
        let liquidated = ctx.mark_to_market_and_liquidate("SYM", 80_000_000).unwrap();
        assert!(liquidated.contains(&"alice".to_string()));
        assert!(ctx.get_position("alice", "SYM").unwrap().is_flat());
    }
}
