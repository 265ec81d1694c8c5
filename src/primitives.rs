//! Price, identifier, and timestamp primitives.
//!
//! Prices are fixed-point integers in micro-units of quote currency so tick
//! arithmetic is exact; quantities are plain `f64` contract sizes per
//! `spec.md` §3/§9. Identifiers and sequence numbers are monotonic `u64`s
//! minted by a single per-context counter so that replay reproduces them
//! exactly (grounded in `nexus_core::types::fixed_point::Price`, adapted from
//! its 1e8 scale to the spec's micro-unit, 1e6 scale).

use crossbeam::atomic::AtomicCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Scale factor for fixed-point prices: 1 unit = 1e-6 of quote currency.
pub const MICRO: i64 = 1_000_000;

/// A price expressed in integer micro-units of quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_micro(raw: i64) -> Self {
        Price(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `true` if `self` is an integer multiple of `tick`.
    pub fn aligned_to(&self, tick: i64) -> bool {
        tick > 0 && self.0 % tick == 0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MICRO as f64
    }

    pub fn from_f64(value: f64) -> Self {
        Price((value * MICRO as f64).round() as i64)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = self.0 / MICRO;
        let frac = (self.0 % MICRO).unsigned_abs();
        write!(f, "{integer}.{frac:06}")
    }
}

impl std::ops::Add for Price {
    type Output = Price;
    fn add(self, rhs: Price) -> Price {
        Price(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Price {
    type Output = Price;
    fn sub(self, rhs: Price) -> Price {
        Price(self.0 - rhs.0)
    }
}

/// Monotonically increasing 64-bit identifier source shared by orders,
/// trades, and journal sequence numbers. A single counter per `CoreContext`
/// (spec.md §9: "one logical coordinator per concern").
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new(start: u64) -> Self {
        Self { next: AtomicU64::new(start) }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Fast-forward the generator past a value observed during replay, so
    /// live operation resumes without id collisions.
    pub fn observe(&self, seen: u64) {
        self.next.fetch_max(seen + 1, Ordering::Relaxed);
    }

    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Nanosecond timestamp source. Wall-clock in live operation; during replay
/// callers pass through the timestamp recorded in the journal instead of
/// calling `now_ns()` again, preserving determinism.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A signed quantity epsilon below which a position is treated as flat
/// (spec.md §9: "Comparisons `|size| < 1e-4` treat a position as closed").
pub const QTY_EPSILON: f64 = 1e-4;

pub fn is_zero_qty(qty: f64) -> bool {
    qty.abs() < QTY_EPSILON
}

/// Shared atomic last-trade-price cell, used by the order book and the stop
/// order table (spec.md §4.2.3 triggers off last-trade by default). Grounded
/// in `joaquinbejar-OrderBook-rs`'s `crossbeam::atomic::AtomicCell<u128>`
/// last-trade-price cell, narrowed to `i64` for this crate's micro-unit
/// price scale.
#[derive(Debug)]
pub struct LastPrice(AtomicCell<i64>);

impl LastPrice {
    pub fn new() -> Self {
        Self(AtomicCell::new(i64::MIN))
    }

    pub fn set(&self, price: Price) {
        self.0.store(price.0);
    }

    pub fn get(&self) -> Option<Price> {
        let raw = self.0.load();
        if raw == i64::MIN { None } else { Some(Price(raw)) }
    }
}

impl Default for LastPrice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_display_matches_micro_scale() {
        let p = Price::from_micro(100_500_000);
        assert_eq!(format!("{p}"), "100.500000");
    }

    #[test]
    fn price_alignment() {
        assert!(Price::from_micro(100).aligned_to(1));
        assert!(Price::from_micro(100).aligned_to(10));
        assert!(!Price::from_micro(105).aligned_to(10));
    }

    #[test]
    fn id_generator_is_monotonic_and_observable() {
        let gen = IdGenerator::new(1);
        assert_eq!(gen.next(), 1);
        assert_eq!(gen.next(), 2);
        gen.observe(50);
        assert_eq!(gen.next(), 51);
    }

    #[test]
    fn side_opposite_roundtrips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite().opposite(), Side::Sell);
    }
}
