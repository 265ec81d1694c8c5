//! Order lifecycle types (spec.md §3 "Order").
//!
//! Field-for-field the teacher's `services::matching::types::OrderEntry` /
//! `OrderStatus`, widened with the order types, stop price, and reduce-only
//! flag the spec's derivatives scope requires.

use crate::primitives::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Ioc,
    Fok,
    PostOnly,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

/// A single order, resting or in-flight. Invariants (spec.md §3):
/// `filled_qty + remaining_qty == original_quantity`;
/// `status == Filled ⇔ remaining_qty == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol: String,
    pub user: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price in micro-units; zero for `Market`.
    pub price: i64,
    pub stop_price: Option<i64>,
    pub original_quantity: f64,
    pub filled_qty: f64,
    pub remaining_qty: f64,
    pub status: OrderStatus,
    pub created_at: u64,
    pub updated_at: u64,
    pub reduce_only: bool,
    pub client_order_id: Option<String>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        symbol: impl Into<String>,
        user: impl Into<String>,
        side: Side,
        order_type: OrderType,
        price: i64,
        stop_price: Option<i64>,
        quantity: f64,
        reduce_only: bool,
        client_order_id: Option<String>,
        now: u64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            user: user.into(),
            side,
            order_type,
            price,
            stop_price,
            original_quantity: quantity,
            filled_qty: 0.0,
            remaining_qty: quantity,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
            reduce_only,
            client_order_id,
        }
    }

    pub fn is_resting_eligible(&self) -> bool {
        matches!(self.order_type, OrderType::Limit | OrderType::PostOnly)
    }

    /// Apply a fill of `qty` at `price`, updating status and timestamps.
    /// Caller is responsible for emitting the corresponding `Trade`.
    pub fn apply_fill(&mut self, qty: f64, now: u64) {
        debug_assert!(qty <= self.remaining_qty + crate::primitives::QTY_EPSILON);
        self.filled_qty += qty;
        self.remaining_qty = (self.remaining_qty - qty).max(0.0);
        self.status = if crate::primitives::is_zero_qty(self.remaining_qty) {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = now;
    }

    pub fn cancel_remainder(&mut self, now: u64) {
        if !self.status.is_terminal() {
            self.status = OrderStatus::Cancelled;
            self.updated_at = now;
        }
    }

    /// Invariant check used by property tests (spec.md §8).
    pub fn check_invariants(&self) -> Result<(), String> {
        let sum = self.filled_qty + self.remaining_qty;
        if (sum - self.original_quantity).abs() > crate::primitives::QTY_EPSILON {
            return Err(format!(
                "filled_qty + remaining_qty ({sum}) != original_quantity ({})",
                self.original_quantity
            ));
        }
        if self.status == OrderStatus::Filled && !crate::primitives::is_zero_qty(self.remaining_qty) {
            return Err("status Filled but remaining_qty != 0".into());
        }
        Ok(())
    }
}
