//! Matching Engine (spec.md §4.2): per-symbol order books, routed by a
//! global registry. The engine is the only mutator of books and the only
//! caller of Position Manager state-changing operations.
//!
//! Concurrency follows spec.md §5: one lock per symbol guards both the book
//! and the stop-trigger table; the lock-acquisition order is symbol →
//! account → journal, so `submit_order` takes the symbol lock first and
//! only ever reaches into `PositionManager`/`JournalWriter` while holding it
//! — never the reverse. Grounded in the teacher's per-symbol `Orderbook`
//! registry (`services/matching/orchestrator.rs`'s `OrderFlowOrchestrator`),
//! stripped of its `sqlx` persistence and rebuilt around `JournalWriter`.

pub mod matching;
pub mod stop;
pub mod stp;

use crate::catalog::ProductCatalog;
use crate::error::CoreError;
use crate::journal::{EventBody, JournalWriter};
use crate::order::{Order, OrderStatus, OrderType};
use crate::orderbook::book::{Book, DepthSnapshot, InsertResult};
use crate::position::PositionManager;
use crate::primitives::{is_zero_qty, now_ns, IdGenerator, LastPrice, Side};
use crate::trade::Trade;
use dashmap::DashMap;
use matching::{crossable_quantity, finalize_non_resting, match_order, should_rest, FeeConfig, RejectReason};
use parking_lot::Mutex;
use std::sync::Arc;
use stop::StopBook;
use stp::StpMode;

/// Per-symbol state: one book, one stop table, one last-trade cell, all
/// behind a single mutex (spec.md §5 "Per-symbol serialization").
struct SymbolEngine {
    guarded: Mutex<SymbolGuarded>,
    last_price: LastPrice,
}

struct SymbolGuarded {
    book: Book,
    stops: StopBook,
}

impl SymbolEngine {
    fn new(symbol: &str, tick_size: i64) -> Self {
        Self {
            guarded: Mutex::new(SymbolGuarded { book: Book::new(symbol, tick_size), stops: StopBook::new() }),
            last_price: LastPrice::new(),
        }
    }
}

/// Result of `submit_order`: the accepted order's id and every trade
/// produced against it (spec.md §6 "submit_order" success shape).
#[derive(Debug)]
pub struct SubmitOutcome {
    pub order_id: u64,
    pub trades: Vec<Trade>,
    pub status: OrderStatus,
}

pub struct MatchingEngine {
    symbols: DashMap<String, Arc<SymbolEngine>>,
    catalog: Arc<ProductCatalog>,
    positions: Arc<PositionManager>,
    journal: Arc<JournalWriter>,
    order_ids: IdGenerator,
    trade_ids: IdGenerator,
    stp_mode: StpMode,
    fees: FeeConfig,
    /// `true` during journal replay: suppresses re-journaling of events
    /// already durable on disk (spec.md §4.5 step 2).
    replaying: std::sync::atomic::AtomicBool,
    /// Trade fan-out path for external consumers (market-data, WS gateway)
    /// the synchronous core doesn't itself implement. Grounded in the
    /// teacher's `crossbeam` dependency, wired up as an unbounded channel
    /// the way `joaquinbejar-OrderBook-rs` publishes fills off its matching
    /// loop.
    trade_tx: crossbeam::channel::Sender<Trade>,
    trade_rx: Mutex<Option<crossbeam::channel::Receiver<Trade>>>,
    /// Per-order margin hold: `(remaining_reserved, reserved_per_unit)`.
    /// Populated when a non-reduce-only order is accepted (spec.md §4.3
    /// `reserve_margin`) and drained as the order fills or is cancelled, so
    /// two resting orders against the same account can never jointly
    /// over-commit its equity before either one trades.
    reserved_margin: DashMap<u64, (f64, f64)>,
}

impl MatchingEngine {
    pub fn new(catalog: Arc<ProductCatalog>, positions: Arc<PositionManager>, journal: Arc<JournalWriter>) -> Self {
        let (trade_tx, trade_rx) = crossbeam::channel::unbounded();
        Self {
            symbols: DashMap::new(),
            catalog,
            positions,
            journal,
            order_ids: IdGenerator::new(1),
            trade_ids: IdGenerator::new(1),
            stp_mode: StpMode::default(),
            fees: FeeConfig::default(),
            replaying: std::sync::atomic::AtomicBool::new(false),
            trade_tx,
            trade_rx: Mutex::new(Some(trade_rx)),
            reserved_margin: DashMap::new(),
        }
    }

    /// Releases up to `qty * rate` of `order_id`'s remaining margin hold,
    /// called once per fill (maker or taker side of a trade). No-op if the
    /// order never reserved margin (e.g. reduce-only).
    fn release_margin_for_order(&self, order_id: u64, user: &str, symbol: &str, qty: f64, now: u64) -> Result<(), CoreError> {
        let Some(mut entry) = self.reserved_margin.get_mut(&order_id) else { return Ok(()) };
        let (remaining, rate) = *entry;
        let amount = (qty * rate).min(remaining);
        if amount <= 0.0 {
            return Ok(());
        }
        self.positions.release_margin(user, amount);
        entry.0 = remaining - amount;
        let drained = entry.0 <= crate::primitives::QTY_EPSILON;
        drop(entry);
        if drained {
            self.reserved_margin.remove(&order_id);
        }
        self.journal_append(now, EventBody::MarginRelease { user: user.to_string(), symbol: symbol.to_string(), amount })
    }

    /// Releases whatever margin remains held for `order_id`, in full — used
    /// when the order leaves the book for good (cancel, reject, or the last
    /// sliver after a fill that fully consumes it).
    fn release_remaining_margin_for_order(&self, order_id: u64, user: &str, symbol: &str, now: u64) -> Result<(), CoreError> {
        let Some((_, (remaining, _))) = self.reserved_margin.remove(&order_id) else { return Ok(()) };
        if remaining <= 0.0 {
            return Ok(());
        }
        self.positions.release_margin(user, remaining);
        self.journal_append(now, EventBody::MarginRelease { user: user.to_string(), symbol: symbol.to_string(), amount: remaining })
    }

    /// Takes the trade-publish receiver. `None` if already taken; only one
    /// consumer drains this engine's fan-out channel at a time.
    pub fn subscribe_trades(&self) -> Option<crossbeam::channel::Receiver<Trade>> {
        self.trade_rx.lock().take()
    }

    pub fn set_replaying(&self, value: bool) {
        self.replaying.store(value, std::sync::atomic::Ordering::SeqCst);
    }

    fn is_replaying(&self) -> bool {
        self.replaying.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn symbol_engine(&self, symbol: &str, tick_size: i64) -> Arc<SymbolEngine> {
        self.symbols.entry(symbol.to_string()).or_insert_with(|| Arc::new(SymbolEngine::new(symbol, tick_size))).clone()
    }

    fn journal_append(&self, now: u64, body: EventBody) -> Result<(), CoreError> {
        if self.is_replaying() {
            return Ok(());
        }
        self.journal.append(now, &body).map(|_| ()).map_err(|e| {
            tracing::error!(error = %e, "journal append failed, treating as fatal durability fault");
            CoreError::Durability(e.to_string())
        })
    }

    /// `submit_order` (spec.md §6). Validates, matches, journals, and
    /// applies position/margin side effects for every produced trade.
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
    ) -> Result<SubmitOutcome, CoreError> {
        let info = self
            .catalog
            .get(symbol)
            .filter(|i| i.active)
            .ok_or_else(|| CoreError::InvalidSymbol(symbol.to_string()))?;

        if qty < info.min_size || qty > info.max_size {
            return Err(CoreError::InvalidSize { symbol: symbol.to_string(), qty, min: info.min_size, max: info.max_size });
        }
        let reference_price = if order_type == OrderType::Market { info.mark_price } else { price };
        if order_type != OrderType::Market && reference_price % info.tick_size != 0 {
            return Err(CoreError::InvalidPrice { symbol: symbol.to_string(), price, tick: info.tick_size });
        }
        if reduce_only {
            if let Some(pos) = self.positions.position(user, symbol) {
                let would_increase = pos.size.signum() == side.sign() || pos.is_flat();
                if would_increase {
                    return Err(CoreError::ReduceOnlyViolation);
                }
            } else {
                return Err(CoreError::ReduceOnlyViolation);
            }
        }

        let required_margin = qty * reference_price as f64 / info.leverage.max(1) as f64;
        let now = now_ns();

        if !reduce_only && !self.positions.reserve_margin(user, required_margin) {
            return Err(CoreError::InsufficientMargin { available: self.positions.available_margin(user), required: required_margin });
        }

        let order_id = self.order_ids.next();
        let mut order = Order::new(order_id, symbol, user, side, order_type, price, stop_price, qty, reduce_only, client_order_id, now);

        if !reduce_only {
            self.reserved_margin.insert(order_id, (required_margin, required_margin / qty));
            self.journal_append(now, EventBody::MarginLock { user: user.to_string(), symbol: symbol.to_string(), amount: required_margin })?;
        }

        self.journal_append(now, EventBody::OrderNew {
            order_id,
            symbol: symbol.to_string(),
            user: user.to_string(),
            side: matches!(side, Side::Sell) as u8,
            order_type: order_type_code(order_type),
            price,
            has_stop: stop_price.is_some(),
            stop_price: stop_price.unwrap_or(0),
            qty,
            reduce_only,
        })?;

        let engine = self.symbol_engine(symbol, info.tick_size);
        let mut guarded = engine.guarded.lock();

        if order_type == OrderType::StopLimit {
            let triggered_already = match side {
                Side::Buy => engine.last_price.get().map(|p| p.0 >= stop_price.unwrap_or(i64::MAX)).unwrap_or(false),
                Side::Sell => engine.last_price.get().map(|p| p.0 <= stop_price.unwrap_or(i64::MIN)).unwrap_or(false),
            };
            if !triggered_already {
                guarded.stops.insert(order.clone());
                return Ok(SubmitOutcome { order_id, trades: Vec::new(), status: OrderStatus::New });
            }
        }

        let mut all_trades = Vec::new();
        self.run_match_and_settle(&engine, &mut guarded, &mut order, now, &mut all_trades)?;

        Ok(SubmitOutcome { order_id, trades: all_trades, status: order.status })
    }

    /// Runs one order through matching, applies trade side effects, rests
    /// or cancels the remainder, updates the last-trade price, and fires
    /// any stops it triggers. Shared by `submit_order` and stop re-entry.
    fn run_match_and_settle(
        &self,
        engine: &SymbolEngine,
        guarded: &mut SymbolGuarded,
        order: &mut Order,
        now: u64,
        all_trades: &mut Vec<Trade>,
    ) -> Result<(), CoreError> {
        let trade_ids = &self.trade_ids;
        let mut next_id = || trade_ids.next();
        let outcome = match_order(&mut guarded.book, order, self.stp_mode, self.fees, &mut next_id, now);

        if let Some(reason) = outcome.rejected {
            order.status = OrderStatus::Rejected;
            // `OrderNew` is already durable; a rejection never produces any
            // trades, so the whole reservation releases and a compensating
            // `Cancel` keeps replay from resurrecting an order that was
            // never actually live (spec.md §4.5 step 3).
            self.release_remaining_margin_for_order(order.id, &order.user, &order.symbol, now)?;
            self.journal_append(now, EventBody::Cancel { order_id: order.id, symbol: order.symbol.clone() })?;
            return Err(match reason {
                RejectReason::PostOnlyWouldCross => CoreError::PostOnlyCross(order.symbol.clone()),
                RejectReason::FokUnfillable => CoreError::FokUnfillable,
            });
        }

        for trade in &outcome.trades {
            self.journal_append(now, EventBody::Trade {
                trade_id: trade.id,
                symbol: trade.symbol.clone(),
                maker_order_id: trade.maker_order_id,
                taker_order_id: trade.taker_order_id,
                maker_user: trade.maker_user.clone(),
                taker_user: trade.taker_user.clone(),
                taker_side: matches!(trade.taker_side, Side::Sell) as u8,
                price: trade.price,
                qty: trade.quantity,
                maker_fee: trade.maker_fee,
                taker_fee: trade.taker_fee,
            })?;

            let maker_signed = if trade.taker_side == Side::Buy { -trade.quantity } else { trade.quantity };
            let taker_signed = -maker_signed;
            let leverage = self.catalog.get(&trade.symbol).map(|i| i.leverage).unwrap_or(1);
            self.positions.apply_fill(&trade.maker_user, &trade.symbol, maker_signed, trade.price, leverage, now);
            self.positions.apply_fill(&trade.taker_user, &trade.symbol, taker_signed, trade.price, leverage, now);

            self.positions.debit_fee(&trade.taker_user, trade.taker_fee);
            self.positions.credit_fee(&trade.maker_user, trade.maker_fee);

            // The matched quantity's margin is now accounted for by the
            // position's own `margin_used` (spec.md §4.3); the order-level
            // hold for that slice releases on both sides of the trade.
            self.release_margin_for_order(trade.maker_order_id, &trade.maker_user, &trade.symbol, trade.quantity, now)?;
            self.release_margin_for_order(trade.taker_order_id, &trade.taker_user, &trade.symbol, trade.quantity, now)?;

            engine.last_price.set(crate::primitives::Price(trade.price));
            let _ = self.trade_tx.send(trade.clone());
        }
        all_trades.extend(outcome.trades);

        for cancelled in outcome.cancelled_makers {
            self.release_remaining_margin_for_order(cancelled.id, &cancelled.user, &cancelled.symbol, now)?;
            self.journal_append(now, EventBody::Cancel { order_id: cancelled.id, symbol: cancelled.symbol.clone() })?;
        }
        if outcome.taker_cancelled_by_stp {
            order.status = OrderStatus::Cancelled;
            self.release_remaining_margin_for_order(order.id, &order.user, &order.symbol, now)?;
        }

        if order.status != OrderStatus::Cancelled {
            finalize_non_resting(order, now);
            if should_rest(order) {
                if guarded.book.insert(order.clone()) == InsertResult::RejectedBadTick {
                    order.status = OrderStatus::Rejected;
                    self.release_remaining_margin_for_order(order.id, &order.user, &order.symbol, now)?;
                    return Err(CoreError::InvalidPrice { symbol: order.symbol.clone(), price: order.price, tick: 0 });
                }
            } else if !is_zero_qty(order.remaining_qty) {
                order.status = OrderStatus::Cancelled;
                self.release_remaining_margin_for_order(order.id, &order.user, &order.symbol, now)?;
                self.journal_append(now, EventBody::Cancel { order_id: order.id, symbol: order.symbol.clone() })?;
            } else {
                // Fully filled: drain any rounding sliver the per-trade
                // proportional release left behind.
                self.release_remaining_margin_for_order(order.id, &order.user, &order.symbol, now)?;
            }
        }

        if let Err(detail) = guarded.book.check_invariants() {
            panic!("FATAL invariant violation in {}: {detail}\nbook={:#?}", order.symbol, guarded.book);
        }
        if let Err(detail) = order.check_invariants() {
            panic!("FATAL invariant violation for order {} in {}: {detail}\norder={:#?}", order.id, order.symbol, order);
        }

        if let Some(last) = engine.last_price.get() {
            self.fire_triggered_stops(engine, guarded, last.0, now, all_trades)?;
        }

        Ok(())
    }

    /// Re-entrant stop firing (spec.md §4.2.3): pops every triggered stop
    /// and resubmits it as a Limit order, whose own trades may trigger
    /// further stops.
    fn fire_triggered_stops(
        &self,
        engine: &SymbolEngine,
        guarded: &mut SymbolGuarded,
        last_trade_price: i64,
        now: u64,
        all_trades: &mut Vec<Trade>,
    ) -> Result<(), CoreError> {
        loop {
            let fired = guarded.stops.triggered(last_trade_price);
            if fired.is_empty() {
                break;
            }
            for mut stop_order in fired {
                stop_order.order_type = OrderType::Limit;
                self.run_match_and_settle(engine, guarded, &mut stop_order, now, all_trades)?;
            }
        }
        Ok(())
    }

    pub fn cancel_order(&self, symbol: &str, order_id: u64, user: &str) -> Result<Order, CoreError> {
        let info = self.catalog.get(symbol).ok_or_else(|| CoreError::InvalidSymbol(symbol.to_string()))?;
        let engine = self.symbol_engine(symbol, info.tick_size);
        let mut guarded = engine.guarded.lock();

        if let Some(existing) = guarded.book.get(order_id) {
            if existing.user != user {
                return Err(CoreError::NotOwner { order_id, user: user.to_string() });
            }
        } else if let Some(pending) = guarded.stops.cancel(order_id) {
            let now = now_ns();
            self.release_remaining_margin_for_order(order_id, user, symbol, now)?;
            self.journal_append(now, EventBody::Cancel { order_id, symbol: symbol.to_string() })?;
            return Ok(pending);
        } else {
            return Err(CoreError::NotFound(order_id));
        }

        let removed = guarded.book.cancel(order_id).ok_or(CoreError::NotFound(order_id))?;
        let now = now_ns();
        self.release_remaining_margin_for_order(order_id, user, symbol, now)?;
        self.journal_append(now, EventBody::Cancel { order_id, symbol: symbol.to_string() })?;
        Ok(removed)
    }

    pub fn modify_order(&self, symbol: &str, order_id: u64, user: &str, new_price: Option<i64>, new_qty: Option<f64>) -> Result<bool, CoreError> {
        let info = self.catalog.get(symbol).ok_or_else(|| CoreError::InvalidSymbol(symbol.to_string()))?;
        let engine = self.symbol_engine(symbol, info.tick_size);
        let mut guarded = engine.guarded.lock();

        let existing = guarded.book.get(order_id).ok_or(CoreError::NotFound(order_id))?;
        if existing.user != user {
            return Err(CoreError::NotOwner { order_id, user: user.to_string() });
        }
        if existing.status.is_terminal() {
            return Err(CoreError::AlreadyTerminal(order_id));
        }

        let now = now_ns();
        match guarded.book.modify(order_id, new_price, new_qty, now) {
            Some(true) => {
                if let Some(price) = new_price {
                    self.journal_append(now, EventBody::Modify { order_id, symbol: symbol.to_string(), new_price: price, new_qty: new_qty.unwrap_or(0.0) })?;
                }
                Ok(true)
            }
            Some(false) => Err(CoreError::InvalidModification(format!("order {order_id} rejected modification (tick misalignment)"))),
            None => Err(CoreError::NotFound(order_id)),
        }
    }

    pub fn get_order(&self, symbol: &str, order_id: u64) -> Option<Order> {
        let info = self.catalog.get(symbol)?;
        let engine = self.symbol_engine(symbol, info.tick_size);
        let guarded = engine.guarded.lock();
        guarded.book.get(order_id).cloned()
    }

    pub fn get_bbo(&self, symbol: &str) -> Option<(Option<i64>, Option<i64>)> {
        let info = self.catalog.get(symbol)?;
        let engine = self.symbol_engine(symbol, info.tick_size);
        Some(engine.guarded.lock().book.bbo())
    }

    pub fn get_depth(&self, symbol: &str, n: usize) -> Option<DepthSnapshot> {
        let info = self.catalog.get(symbol)?;
        let engine = self.symbol_engine(symbol, info.tick_size);
        Some(engine.guarded.lock().book.depth(n))
    }

    pub fn get_user_orders(&self, symbol: &str, user: &str) -> Vec<Order> {
        let Some(info) = self.catalog.get(symbol) else { return Vec::new() };
        let engine = self.symbol_engine(symbol, info.tick_size);
        let guarded = engine.guarded.lock();
        guarded.book.all_orders().into_iter().filter(|o| o.user == user).collect()
    }

    /// Every resting order across every registered symbol, for snapshotting
    /// (spec.md §4.4 "Snapshots").
    pub fn all_open_orders(&self) -> Vec<(String, Order)> {
        self.symbols
            .iter()
            .flat_map(|entry| {
                let symbol = entry.key().clone();
                entry.value().guarded.lock().book.all_orders().into_iter().map(move |o| (symbol.clone(), o))
            })
            .collect()
    }

    /// Pure read of how much of `taker`'s size could fill right now,
    /// exposed for callers that want to pre-check FOK viability without
    /// submitting (spec.md §4.2 FOK pre-scan).
    pub fn previewable_liquidity(&self, symbol: &str, taker: &Order) -> f64 {
        let Some(info) = self.catalog.get(symbol) else { return 0.0 };
        let engine = self.symbol_engine(symbol, info.tick_size);
        let guarded = engine.guarded.lock();
        crossable_quantity(&guarded.book, taker)
    }

    /// Restores a resting order into its book during replay, bypassing
    /// matching and journaling entirely (spec.md §4.5 step 3).
    pub fn restore_resting_order(&self, order: Order) {
        let Some(info) = self.catalog.get(&order.symbol) else { return };
        let engine = self.symbol_engine(&order.symbol, info.tick_size);
        engine.guarded.lock().book.insert(order);
    }
}

fn order_type_code(order_type: OrderType) -> u8 {
    match order_type {
        OrderType::Market => 0,
        OrderType::Limit => 1,
        OrderType::Ioc => 2,
        OrderType::Fok => 3,
        OrderType::PostOnly => 4,
        OrderType::StopLimit => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SymbolInfo;
    use crate::journal::JournalWriter;
    use tempfile::tempdir;

    fn engine() -> (MatchingEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let catalog = Arc::new(ProductCatalog::with_symbols([SymbolInfo::new("XAU-MNT-PERP", 1_000_000, 0.001, 1000.0, 10)]));
        let positions = Arc::new(PositionManager::new());
        let journal = Arc::new(JournalWriter::open(dir.path().join("events.journal")).unwrap());
        // Deposits are denominated in the same micro-unit scale as price
        // (spec.md §9: "PnL uses the same convention"), so comfortably
        // exceed any margin requirement at the test's price/quantity scale.
        positions.deposit("alice", 1_000_000_000.0);
        positions.deposit("bob", 1_000_000_000.0);
        (MatchingEngine::new(catalog, positions, journal), dir)
    }

    #[test]
    fn simple_cross_scenario() {
        let (engine, _dir) = engine();
        engine.submit_order("XAU-MNT-PERP", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 5.0, false, None).unwrap();
        let outcome = engine.submit_order("XAU-MNT-PERP", "alice", Side::Buy, OrderType::Market, 0, None, 3.0, false, None).unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, 100_000_000);
        assert_eq!(outcome.trades[0].quantity, 3.0);
        let bbo = engine.get_bbo("XAU-MNT-PERP").unwrap();
        assert_eq!(bbo.1, Some(100_000_000));
        let pos = engine.positions.position("alice", "XAU-MNT-PERP").unwrap();
        assert_eq!(pos.size, 3.0);
    }

    #[test]
    fn post_only_rejection_leaves_book_unchanged() {
        let (engine, _dir) = engine();
        engine.submit_order("XAU-MNT-PERP", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 5.0, false, None).unwrap();
        let err = engine
            .submit_order("XAU-MNT-PERP", "alice", Side::Buy, OrderType::PostOnly, 101_000_000, None, 3.0, false, None)
            .unwrap_err();
        assert_eq!(err, CoreError::PostOnlyCross("XAU-MNT-PERP".to_string()));
        let depth = engine.get_depth("XAU-MNT-PERP", 10).unwrap();
        assert_eq!(depth.asks[0], (100_000_000, 5.0));
    }

    #[test]
    fn invalid_symbol_is_rejected() {
        let (engine, _dir) = engine();
        let err = engine.submit_order("NOPE", "alice", Side::Buy, OrderType::Market, 0, None, 1.0, false, None).unwrap_err();
        assert_eq!(err, CoreError::InvalidSymbol("NOPE".to_string()));
    }

    #[test]
    fn subscribed_trades_are_published_off_the_matching_path() {
        let (engine, _dir) = engine();
        let rx = engine.subscribe_trades().unwrap();
        assert!(engine.subscribe_trades().is_none(), "receiver can only be taken once");

        engine.submit_order("XAU-MNT-PERP", "bob", Side::Sell, OrderType::Limit, 100_000_000, None, 5.0, false, None).unwrap();
        engine.submit_order("XAU-MNT-PERP", "alice", Side::Buy, OrderType::Market, 0, None, 3.0, false, None).unwrap();

        let published = rx.try_recv().unwrap();
        assert_eq!(published.quantity, 3.0);
        assert_eq!(published.price, 100_000_000);
    }
}
