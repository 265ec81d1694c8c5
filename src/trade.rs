//! Trade records (spec.md §3 "Trade"). Immutable once emitted.

use crate::primitives::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub maker_order_id: u64,
    pub taker_order_id: u64,
    pub maker_user: String,
    pub taker_user: String,
    pub taker_side: Side,
    pub price: i64,
    pub quantity: f64,
    pub maker_fee: f64,
    pub taker_fee: f64,
    pub timestamp: u64,
}
