//! The price-time matching algorithm (spec.md §4.2).
//!
//! `match_order` walks the resting side opposite the taker from best price
//! outward, respecting self-trade prevention and each order type's
//! crossing/remainder policy. Grounded in the teacher's `Orderbook::match_order`
//! (`services/matching/orderbook.rs`), restructured around this crate's
//! `Book`/`PriceLevel` split and its `StpMode` (`engine/stp.rs`).

use super::stp::{check_level, StpAction, StpMode};
use crate::order::{Order, OrderStatus, OrderType};
use crate::orderbook::book::{Book, InsertResult};
use crate::primitives::{is_zero_qty, Side};
use crate::trade::Trade;

/// Flat maker/taker fee schedule (spec.md §4.2 "Fees"), mirroring the
/// teacher's `FeeConfig` (`services/matching/types.rs`).
#[derive(Debug, Clone, Copy)]
pub struct FeeConfig {
    pub maker_fee_rate: f64,
    pub taker_fee_rate: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { maker_fee_rate: 0.0002, taker_fee_rate: 0.0005 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    PostOnlyWouldCross,
    FokUnfillable,
}

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    pub cancelled_makers: Vec<Order>,
    pub taker_cancelled_by_stp: bool,
    pub rejected: Option<RejectReason>,
}

fn crosses(taker_side: Side, taker_price: i64, is_market: bool, maker_price: i64) -> bool {
    if is_market {
        return true;
    }
    match taker_side {
        Side::Buy => maker_price <= taker_price,
        Side::Sell => maker_price >= taker_price,
    }
}

/// Total resting quantity reachable by `taker` before its limit stops
/// crossing, used for the FOK pre-scan (spec.md §4.2 "Fill-or-Kill").
pub fn crossable_quantity(book: &Book, taker: &Order) -> f64 {
    let is_market = taker.order_type == OrderType::Market;
    let mut total = 0.0;
    for price in book.opposite_prices(taker.side) {
        if !crosses(taker.side, taker.price, is_market, price) {
            break;
        }
        if let Some(level) = book.clone_level_total(taker.side.opposite(), price) {
            total += level;
        }
        if total >= taker.remaining_qty {
            break;
        }
    }
    total
}

/// Runs `taker` against `book`. Does not decide whether the remainder
/// rests afterward — callers (the engine) apply each order type's
/// remainder policy using `taker.remaining_qty` and `taker.order_type`.
pub fn match_order(
    book: &mut Book,
    taker: &mut Order,
    stp_mode: StpMode,
    fees: FeeConfig,
    next_trade_id: &mut impl FnMut() -> u64,
    now: u64,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    if taker.order_type == OrderType::PostOnly {
        if let Some(best) = match taker.side {
            Side::Buy => book.best_ask(),
            Side::Sell => book.best_bid(),
        } {
            if crosses(taker.side, taker.price, false, best) {
                outcome.rejected = Some(RejectReason::PostOnlyWouldCross);
                return outcome;
            }
        }
        return outcome;
    }

    if taker.order_type == OrderType::Fok && crossable_quantity(book, taker) + crate::primitives::QTY_EPSILON < taker.remaining_qty {
        outcome.rejected = Some(RejectReason::FokUnfillable);
        return outcome;
    }

    let is_market = taker.order_type == OrderType::Market;
    let maker_side = taker.side.opposite();

    'walk: for price in book.opposite_prices(taker.side) {
        if is_zero_qty(taker.remaining_qty) || outcome.taker_cancelled_by_stp {
            break;
        }
        if !crosses(taker.side, taker.price, is_market, price) {
            break;
        }

        loop {
            if is_zero_qty(taker.remaining_qty) {
                break 'walk;
            }
            let snapshot: Vec<Order> = match book.level_mut(maker_side, price) {
                Some(level) => level.iter().cloned().collect(),
                None => break,
            };
            if snapshot.is_empty() {
                break;
            }
            let refs: Vec<&Order> = snapshot.iter().collect();
            let action = check_level(&refs, &taker.user, stp_mode);

            let safe_qty = match &action {
                StpAction::NoConflict => f64::INFINITY,
                StpAction::CancelTaker { safe_qty } | StpAction::CancelBoth { safe_qty, .. } => *safe_qty,
                StpAction::CancelMaker { .. } => f64::INFINITY,
            };

            if let StpAction::CancelMaker { maker_order_ids } = &action {
                for id in maker_order_ids {
                    if let Some(level) = book.level_mut(maker_side, price) {
                        if let Some(order) = level.remove(*id) {
                            outcome.cancelled_makers.push(order);
                        }
                    }
                }
                book.remove_order_from_index(maker_order_ids[0]);
                for id in &maker_order_ids[1..] {
                    book.remove_order_from_index(*id);
                }
                book.drop_level_if_empty(maker_side, price);
                continue;
            }

            let level_matched_so_far: f64 = outcome
                .trades
                .iter()
                .filter(|t| t.price == price)
                .map(|t| t.quantity)
                .sum();
            if level_matched_so_far >= safe_qty - crate::primitives::QTY_EPSILON {
                if matches!(action, StpAction::CancelTaker { .. } | StpAction::CancelBoth { .. }) {
                    outcome.taker_cancelled_by_stp = true;
                    if let StpAction::CancelBoth { maker_order_id, .. } = action {
                        if let Some(level) = book.level_mut(maker_side, price) {
                            if let Some(order) = level.remove(maker_order_id) {
                                outcome.cancelled_makers.push(order);
                            }
                        }
                        book.remove_order_from_index(maker_order_id);
                        book.drop_level_if_empty(maker_side, price);
                    }
                }
                break 'walk;
            }

            let level = book.level_mut(maker_side, price).expect("level vanished mid-match");
            let maker_remaining = level.front().map(|o| o.remaining_qty).unwrap_or(0.0);
            if maker_remaining <= 0.0 {
                break;
            }
            let headroom = (safe_qty - level_matched_so_far).max(0.0);
            let fill_qty = taker.remaining_qty.min(maker_remaining).min(headroom);
            if fill_qty <= 0.0 {
                break 'walk;
            }

            let maker_id = level.front().unwrap().id;
            let maker_user = level.front().unwrap().user.clone();
            level.reduce_head(fill_qty);
            if let Some(maker) = level.front_mut() {
                maker.apply_fill(fill_qty, now);
            }
            taker.apply_fill(fill_qty, now);

            let (maker_fee, taker_fee) = (fill_qty * price as f64 * fees.maker_fee_rate, fill_qty * price as f64 * fees.taker_fee_rate);
            outcome.trades.push(Trade {
                id: next_trade_id(),
                symbol: taker.symbol.clone(),
                maker_order_id: maker_id,
                taker_order_id: taker.id,
                maker_user,
                taker_user: taker.user.clone(),
                taker_side: taker.side,
                price,
                quantity: fill_qty,
                maker_fee,
                taker_fee,
                timestamp: now,
            });

            let maker_filled = book
                .level_mut(maker_side, price)
                .and_then(|l| l.front())
                .map(|o| is_zero_qty(o.remaining_qty))
                .unwrap_or(false);
            if maker_filled {
                if let Some(level) = book.level_mut(maker_side, price) {
                    level.pop_front();
                }
                book.remove_order_from_index(maker_id);
            }
            book.drop_level_if_empty(maker_side, price);
        }
    }

    outcome
}

/// Applies an order type's post-match remainder policy. Returns `true` if
/// the remainder should rest in the book.
pub fn should_rest(order: &Order) -> bool {
    if is_zero_qty(order.remaining_qty) || order.status.is_terminal() {
        return false;
    }
    matches!(order.order_type, OrderType::Limit | OrderType::PostOnly | OrderType::StopLimit)
}

/// `Market`, `Ioc`, and `Fok` orders never rest: any remainder is cancelled
/// immediately after matching (spec.md §4.2 order type table).
pub fn finalize_non_resting(order: &mut Order, now: u64) {
    if !is_zero_qty(order.remaining_qty) && matches!(order.order_type, OrderType::Market | OrderType::Ioc | OrderType::Fok) {
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::book::Book;

    fn limit(id: u64, user: &str, side: Side, price: i64, qty: f64) -> Order {
        Order::new(id, "SYM", user, side, OrderType::Limit, price, None, qty, false, None, 0)
    }

    fn ids(start: u64) -> impl FnMut() -> u64 {
        let mut next = start;
        move || {
            let v = next;
            next += 1;
            v
        }
    }

    #[test]
    fn simple_cross_produces_trade_at_maker_price() {
        let mut book = Book::new("SYM", 1);
        book.insert(limit(1, "bob", Side::Sell, 100, 5.0));
        let mut taker = limit(2, "alice", Side::Buy, 101, 3.0);
        let mut gen = ids(1000);
        let outcome = match_order(&mut book, &mut taker, StpMode::CancelOldest, FeeConfig::default(), &mut gen, 10);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].price, 100);
        assert_eq!(outcome.trades[0].quantity, 3.0);
        assert_eq!(taker.remaining_qty, 0.0);
    }

    #[test]
    fn fifo_priority_fills_earlier_maker_first() {
        let mut book = Book::new("SYM", 1);
        book.insert(limit(1, "bob", Side::Sell, 100, 2.0));
        book.insert(limit(2, "carol", Side::Sell, 100, 2.0));
        let mut taker = limit(3, "alice", Side::Buy, 100, 3.0);
        let mut gen = ids(1000);
        let outcome = match_order(&mut book, &mut taker, StpMode::CancelOldest, FeeConfig::default(), &mut gen, 10);
        assert_eq!(outcome.trades.len(), 2);
        assert_eq!(outcome.trades[0].maker_order_id, 1);
        assert_eq!(outcome.trades[0].quantity, 2.0);
        assert_eq!(outcome.trades[1].maker_order_id, 2);
        assert_eq!(outcome.trades[1].quantity, 1.0);
    }

    #[test]
    fn post_only_rejects_instead_of_crossing() {
        let mut book = Book::new("SYM", 1);
        book.insert(limit(1, "bob", Side::Sell, 100, 5.0));
        let mut taker = Order::new(2, "SYM", "alice", Side::Buy, OrderType::PostOnly, 101, None, 3.0, false, None, 0);
        let mut gen = ids(1000);
        let outcome = match_order(&mut book, &mut taker, StpMode::CancelOldest, FeeConfig::default(), &mut gen, 10);
        assert_eq!(outcome.rejected, Some(RejectReason::PostOnlyWouldCross));
        assert!(outcome.trades.is_empty());
    }

    #[test]
    fn fok_unfillable_rejects_with_zero_fills() {
        let mut book = Book::new("SYM", 1);
        book.insert(limit(1, "bob", Side::Sell, 100, 2.0));
        let mut taker = Order::new(2, "SYM", "alice", Side::Buy, OrderType::Fok, 100, None, 5.0, false, None, 0);
        let mut gen = ids(1000);
        let outcome = match_order(&mut book, &mut taker, StpMode::CancelOldest, FeeConfig::default(), &mut gen, 10);
        assert_eq!(outcome.rejected, Some(RejectReason::FokUnfillable));
        assert!(outcome.trades.is_empty());
        assert_eq!(taker.remaining_qty, 5.0, "FOK must not partially fill on rejection");
    }

    #[test]
    fn self_trade_cancel_oldest_pulls_maker_and_continues() {
        let mut book = Book::new("SYM", 1);
        book.insert(limit(1, "alice", Side::Sell, 100, 2.0));
        book.insert(limit(2, "bob", Side::Sell, 100, 2.0));
        let mut taker = limit(3, "alice", Side::Buy, 100, 3.0);
        let mut gen = ids(1000);
        let outcome = match_order(&mut book, &mut taker, StpMode::CancelOldest, FeeConfig::default(), &mut gen, 10);
        assert_eq!(outcome.cancelled_makers.len(), 1);
        assert_eq!(outcome.cancelled_makers[0].id, 1);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].maker_order_id, 2);
        assert_eq!(taker.remaining_qty, 1.0);
    }
}
