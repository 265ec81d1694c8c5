//! Self-trade prevention (spec.md §4.2 "Self-trade prevention").
//!
//! Scans the resting orders at a price level ahead of a same-user match and
//! decides how to defuse it. Grounded in
//! `joaquinbejar-OrderBook-rs/src/orderbook/stp.rs`'s `check_stp_at_level`,
//! adapted to this crate's plain `u64` user/order ids and to the spec's
//! default mode being `CancelOldest` rather than `None`.

use crate::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum StpMode {
    /// Cancel whichever of the two conflicting orders is older. A resting
    /// order is always older than the taker that just arrived, so in
    /// practice this cancels the maker and lets the taker keep matching
    /// against later, unrelated levels.
    #[default]
    CancelOldest,
    /// Cancel the incoming taker order outright; resting orders are left in
    /// the book untouched.
    CancelTaker,
    /// Cancel the same-user resting order(s) at the level and let the taker
    /// continue matching against the rest of the book.
    CancelMaker,
    /// Cancel both the taker and the conflicting maker; matching stops.
    CancelBoth,
}

/// Outcome of an STP check against a single price level's FIFO queue.
#[derive(Debug, Clone, PartialEq)]
pub enum StpAction {
    NoConflict,
    /// Taker may safely match up to `safe_qty` against non-conflicting
    /// makers before hitting a same-user order; matching should stop there.
    CancelTaker { safe_qty: f64 },
    /// These maker order ids (same user as the taker) must be pulled from
    /// the book before the taker continues matching at this level.
    CancelMaker { maker_order_ids: Vec<u64> },
    CancelBoth { safe_qty: f64, maker_order_id: u64 },
}

/// `orders` must be in FIFO (time-priority) order, as returned by
/// `PriceLevel::iter`.
pub fn check_level(orders: &[&Order], taker_user: &str, mode: StpMode) -> StpAction {
    match mode {
        StpMode::CancelOldest | StpMode::CancelMaker => {
            let maker_order_ids: Vec<u64> =
                orders.iter().filter(|o| o.user == taker_user).map(|o| o.id).collect();
            if maker_order_ids.is_empty() {
                StpAction::NoConflict
            } else {
                StpAction::CancelMaker { maker_order_ids }
            }
        }
        StpMode::CancelTaker => {
            let mut safe_qty = 0.0;
            for order in orders {
                if order.user == taker_user {
                    return StpAction::CancelTaker { safe_qty };
                }
                safe_qty += order.remaining_qty;
            }
            StpAction::NoConflict
        }
        StpMode::CancelBoth => {
            let mut safe_qty = 0.0;
            for order in orders {
                if order.user == taker_user {
                    return StpAction::CancelBoth { safe_qty, maker_order_id: order.id };
                }
                safe_qty += order.remaining_qty;
            }
            StpAction::NoConflict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderType;
    use crate::primitives::Side;

    fn order(id: u64, user: &str, qty: f64) -> Order {
        Order::new(id, "SYM", user, Side::Sell, OrderType::Limit, 100, None, qty, false, None, 0)
    }

    #[test]
    fn cancel_oldest_collects_same_user_makers() {
        let a = order(1, "alice", 5.0);
        let b = order(2, "bob", 3.0);
        let orders = vec![&a, &b];
        match check_level(&orders, "alice", StpMode::CancelOldest) {
            StpAction::CancelMaker { maker_order_ids } => assert_eq!(maker_order_ids, vec![1]),
            other => panic!("expected CancelMaker, got {other:?}"),
        }
    }

    #[test]
    fn cancel_taker_reports_safe_quantity_before_conflict() {
        let a = order(1, "bob", 5.0);
        let b = order(2, "alice", 3.0);
        let orders = vec![&a, &b];
        match check_level(&orders, "alice", StpMode::CancelTaker) {
            StpAction::CancelTaker { safe_qty } => assert_eq!(safe_qty, 5.0),
            other => panic!("expected CancelTaker, got {other:?}"),
        }
    }

    #[test]
    fn different_users_never_conflict() {
        let a = order(1, "bob", 5.0);
        let orders = vec![&a];
        assert_eq!(check_level(&orders, "alice", StpMode::CancelBoth), StpAction::NoConflict);
    }
}
