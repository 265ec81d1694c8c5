//! Position & Margin Manager (spec.md §4.3).
//!
//! Isolated-margin leveraged positions keyed by `(user, symbol)`, plus a
//! per-user cash account. Grounded in the teacher's `dashmap`-backed
//! concurrent state (`services/matching/orderbook.rs`'s `order_index`)
//! generalized from order bookkeeping to position/account bookkeeping; the
//! liquidation/insurance/funding/ADL vocabulary is grounded in the handler
//! usage in `api/handlers/{liquidation,funding_rate,adl}.rs`, which
//! reference these service types without the pack including their
//! definitions — authored here from that usage.

pub mod account;
pub mod adl;
pub mod funding;
pub mod insurance;

pub use account::Account;
pub use adl::{AdlEngine, AdlRanking};
pub use funding::FundingEngine;
pub use insurance::InsuranceFund;

use crate::error::CoreError;
use crate::primitives::is_zero_qty;
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub user: String,
    pub symbol: String,
    pub size: f64,
    pub avg_entry_price: i64,
    pub margin_used: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub liquidation_price: Option<i64>,
    pub leverage: u32,
    pub opened_at: u64,
    pub updated_at: u64,
}

impl Position {
    fn new(user: String, symbol: String, size: f64, price: i64, leverage: u32, now: u64) -> Self {
        let margin_used = size.abs() * price as f64 / leverage as f64;
        Self {
            user,
            symbol,
            size,
            avg_entry_price: price,
            margin_used,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            liquidation_price: None,
            leverage,
            opened_at: now,
            updated_at: now,
        }
    }

    pub fn is_flat(&self) -> bool {
        is_zero_qty(self.size)
    }

    fn side_sign(&self) -> f64 {
        if self.size >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Outcome of `apply_fill`, reported back to the engine for journaling and
/// fee accounting.
#[derive(Debug, Clone, Default)]
pub struct FillApplication {
    pub realized_delta: f64,
    pub margin_delta: f64,
    pub position_closed: bool,
}

pub struct PositionManager {
    positions: DashMap<(String, String), Position>,
    accounts: DashMap<String, Account>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self { positions: DashMap::new(), accounts: DashMap::new() }
    }

    pub fn account(&self, user: &str) -> Account {
        self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user)).clone()
    }

    pub fn position(&self, user: &str, symbol: &str) -> Option<Position> {
        self.positions.get(&(user.to_string(), symbol.to_string())).map(|e| e.value().clone())
    }

    pub fn deposit(&self, user: &str, amount: f64) {
        self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user)).cash_balance += amount;
    }

    pub fn withdraw(&self, user: &str, amount: f64) -> bool {
        let mut entry = self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user));
        if entry.cash_balance >= amount {
            entry.cash_balance -= amount;
            true
        } else {
            false
        }
    }

    pub fn debit_fee(&self, user: &str, amount: f64) {
        self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user)).cash_balance -= amount;
    }

    pub fn credit_fee(&self, user: &str, amount: f64) {
        self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user)).cash_balance += amount;
    }

    /// Sums unrealized PnL and margin_used across every open position the
    /// user holds, the shared input to `available_margin` and
    /// `reserve_margin` so both see the same picture of committed margin.
    fn position_margin_totals(&self, user: &str) -> (f64, f64) {
        let mut unrealized_total = 0.0;
        let mut margin_used_total = 0.0;
        for entry in self.positions.iter() {
            if entry.user == user {
                unrealized_total += entry.unrealized_pnl;
                margin_used_total += entry.margin_used;
            }
        }
        (unrealized_total, margin_used_total)
    }

    /// `available = equity − Σ margin_used − margin_reserved` (spec.md §3
    /// Account invariant), computed fresh from the account's cash/realized
    /// PnL, every open position's unrealized PnL and margin_used, and any
    /// explicitly reserved margin.
    pub fn available_margin(&self, user: &str) -> f64 {
        let account = self.account(user);
        let (unrealized_total, margin_used_total) = self.position_margin_totals(user);
        account.equity(unrealized_total) - margin_used_total - account.margin_reserved
    }

    /// `reserve_margin` — atomic; fails when `available < amount` (spec.md
    /// §4.3). Checked against the same equity/margin_used/unrealized picture
    /// as `available_margin` so two orders reserving concurrently against
    /// open positions can't jointly over-commit the account.
    pub fn reserve_margin(&self, user: &str, amount: f64) -> bool {
        let (unrealized_total, margin_used_total) = self.position_margin_totals(user);
        let mut account = self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user));
        let available = account.equity(unrealized_total) - margin_used_total - account.margin_reserved;
        if available >= amount {
            account.margin_reserved += amount;
            true
        } else {
            false
        }
    }

    pub fn release_margin(&self, user: &str, amount: f64) {
        if let Some(mut account) = self.accounts.get_mut(user) {
            account.margin_reserved = (account.margin_reserved - amount).max(0.0);
        }
    }

    /// Applies a fill of `signed_qty` (positive = bought, negative = sold)
    /// at `price` to the `(user, symbol)` position, per spec.md §4.3's four
    /// cases: open, increase, partial close, flip.
    pub fn apply_fill(
        &self,
        user: &str,
        symbol: &str,
        signed_qty: f64,
        price: i64,
        leverage: u32,
        now: u64,
    ) -> FillApplication {
        let key = (user.to_string(), symbol.to_string());
        let mut entry = self.positions.entry(key).or_insert_with(|| {
            Position::new(user.to_string(), symbol.to_string(), 0.0, price, leverage, now)
        });

        let mut result = FillApplication::default();

        if is_zero_qty(entry.size) {
            *entry = Position::new(user.to_string(), symbol.to_string(), signed_qty, price, leverage, now);
            result.margin_delta = entry.margin_used;
            return result;
        }

        let same_sign = entry.side_sign() == signed_qty.signum();

        if same_sign {
            let old_abs = entry.size.abs();
            let add_abs = signed_qty.abs();
            let new_avg = (old_abs * entry.avg_entry_price as f64 + add_abs * price as f64) / (old_abs + add_abs);
            let old_margin = entry.margin_used;
            entry.size += signed_qty;
            entry.avg_entry_price = new_avg.round() as i64;
            entry.margin_used = entry.size.abs() * entry.avg_entry_price as f64 / leverage as f64;
            entry.updated_at = now;
            result.margin_delta = entry.margin_used - old_margin;
        } else if signed_qty.abs() <= entry.size.abs() + crate::primitives::QTY_EPSILON {
            // Partial close (or exact close): realized booked at avg, size shrinks.
            let closed_qty = signed_qty.abs().min(entry.size.abs());
            let realized = (price as f64 - entry.avg_entry_price as f64) * closed_qty * entry.side_sign();
            let old_margin = entry.margin_used;
            entry.size += signed_qty;
            entry.realized_pnl += realized;
            entry.margin_used = entry.size.abs() * entry.avg_entry_price as f64 / leverage as f64;
            entry.updated_at = now;
            result.realized_delta = realized;
            result.margin_delta = entry.margin_used - old_margin;
            if entry.is_flat() {
                result.position_closed = true;
            }
        } else {
            // Flip: fully close at avg, book realized, open residual at price.
            let closed_qty = entry.size.abs();
            let realized = (price as f64 - entry.avg_entry_price as f64) * closed_qty * entry.side_sign();
            let residual = entry.size + signed_qty;
            let old_margin = entry.margin_used;
            *entry = Position::new(user.to_string(), symbol.to_string(), residual, price, leverage, now);
            entry.realized_pnl = realized;
            result.realized_delta = realized;
            result.margin_delta = entry.margin_used - old_margin;
        }

        if let Some(mut account) = self.accounts.get_mut(user) {
            account.realized_pnl += result.realized_delta;
        } else {
            let mut account = Account::new(user);
            account.realized_pnl = result.realized_delta;
            self.accounts.insert(user.to_string(), account);
        }

        result
    }

    /// `liquidation_price` — spec.md §4.3 formula, isolated margin.
    pub fn liquidation_price(pos: &Position, maintenance_ratio: f64) -> i64 {
        let lev = pos.leverage as f64;
        let avg = pos.avg_entry_price as f64;
        let price = if pos.size >= 0.0 {
            avg * (1.0 - 1.0 / lev + maintenance_ratio)
        } else {
            avg * (1.0 + 1.0 / lev - maintenance_ratio)
        };
        price.round() as i64
    }

    /// `mark_to_market` — updates unrealized PnL and liquidation price for
    /// every position in `symbol` (spec.md §4.3).
    pub fn mark_to_market(&self, symbol: &str, mark_price: i64, maintenance_ratio: f64) {
        for mut entry in self.positions.iter_mut() {
            if entry.symbol != symbol || entry.is_flat() {
                continue;
            }
            let unrealized = (mark_price as f64 - entry.avg_entry_price as f64) * entry.size;
            entry.unrealized_pnl = unrealized;
            entry.liquidation_price = Some(Self::liquidation_price(&entry, maintenance_ratio));
        }
    }

    /// `check_liquidation` — spec.md §4.3: true if `mark_price` has crossed
    /// the position's liquidation threshold. Forced close is performed by
    /// the caller (the engine), which has the book lock needed to route the
    /// closing order; this just evaluates the trigger.
    pub fn check_liquidation(&self, user: &str, symbol: &str, mark_price: i64, maintenance_ratio: f64) -> bool {
        let Some(pos) = self.position(user, symbol) else { return false };
        if pos.is_flat() {
            return false;
        }
        let liq_price = Self::liquidation_price(&pos, maintenance_ratio);
        if pos.size > 0.0 {
            mark_price <= liq_price
        } else {
            mark_price >= liq_price
        }
    }

    /// Forced close at `mark_price` following a liquidation trigger. Books
    /// realized PnL and returns the shortfall (positive if the account's
    /// equity went negative and the Insurance Fund must cover it).
    pub fn force_close(&self, user: &str, symbol: &str, mark_price: i64) -> Result<f64, CoreError> {
        let key = (user.to_string(), symbol.to_string());
        let mut entry = self
            .positions
            .get_mut(&key)
            .ok_or_else(|| CoreError::NoPosition { user: user.to_string(), symbol: symbol.to_string() })?;
        let closed_qty = entry.size.abs();
        let realized = (mark_price as f64 - entry.avg_entry_price as f64) * closed_qty * entry.side_sign();
        let margin_used = entry.margin_used;
        entry.realized_pnl += realized;
        entry.size = 0.0;
        entry.margin_used = 0.0;

        let mut account = self.accounts.entry(user.to_string()).or_insert_with(|| Account::new(user));
        account.realized_pnl += realized;
        account.margin_reserved = (account.margin_reserved - margin_used).max(0.0);
        let shortfall = -(realized + margin_used).min(0.0);
        Ok(shortfall)
    }

    pub fn positions_for_symbol(&self, symbol: &str) -> Vec<Position> {
        self.positions.iter().filter(|e| e.symbol == symbol && !e.is_flat()).map(|e| e.value().clone()).collect()
    }

    /// All open positions and accounts, for snapshotting (spec.md §4.4
    /// "Snapshots").
    pub fn all_positions(&self) -> Vec<Position> {
        self.positions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(|e| e.value().clone()).collect()
    }

    /// Replaces in-memory state wholesale, used by the recovery driver
    /// after loading a snapshot (spec.md §4.5 step 1).
    pub fn restore(&self, positions: Vec<Position>, accounts: Vec<Account>) {
        self.positions.clear();
        for pos in positions {
            self.positions.insert((pos.user.clone(), pos.symbol.clone()), pos);
        }
        self.accounts.clear();
        for account in accounts {
            self.accounts.insert(account.user.clone(), account);
        }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_position_sets_avg_and_margin() {
        let pm = PositionManager::new();
        let result = pm.apply_fill("alice", "SYM", 3.0, 100_000_000, 10, 1);
        assert_eq!(result.margin_delta, 3.0 * 100_000_000.0 / 10.0);
        let pos = pm.position("alice", "SYM").unwrap();
        assert_eq!(pos.size, 3.0);
        assert_eq!(pos.avg_entry_price, 100_000_000);
    }

    #[test]
    fn increasing_same_side_reweights_average() {
        let pm = PositionManager::new();
        pm.apply_fill("alice", "SYM", 2.0, 100_000_000, 10, 1);
        pm.apply_fill("alice", "SYM", 2.0, 200_000_000, 10, 2);
        let pos = pm.position("alice", "SYM").unwrap();
        assert_eq!(pos.size, 4.0);
        assert_eq!(pos.avg_entry_price, 150_000_000);
    }

    #[test]
    fn partial_close_books_realized_and_keeps_avg() {
        let pm = PositionManager::new();
        pm.apply_fill("alice", "SYM", 5.0, 100_000_000, 10, 1);
        let result = pm.apply_fill("alice", "SYM", -2.0, 120_000_000, 10, 2);
        assert_eq!(result.realized_delta, 20_000_000.0 * 2.0);
        let pos = pm.position("alice", "SYM").unwrap();
        assert_eq!(pos.size, 3.0);
        assert_eq!(pos.avg_entry_price, 100_000_000, "partial close must not move avg_entry_price");
    }

    #[test]
    fn flip_closes_old_side_and_opens_new() {
        let pm = PositionManager::new();
        pm.apply_fill("alice", "SYM", 2.0, 100_000_000, 10, 1);
        pm.apply_fill("alice", "SYM", -5.0, 110_000_000, 10, 2);
        let pos = pm.position("alice", "SYM").unwrap();
        assert_eq!(pos.size, -3.0);
        assert_eq!(pos.avg_entry_price, 110_000_000);
    }

    #[test]
    fn liquidation_price_matches_formula_for_long_and_short() {
        let mut long = Position::new("a".into(), "SYM".into(), 1.0, 100_000_000, 10, 0);
        long.leverage = 10;
        assert_eq!(PositionManager::liquidation_price(&long, 0.005), (100_000_000.0 * (1.0 - 0.1 + 0.005)).round() as i64);

        let mut short = Position::new("a".into(), "SYM".into(), -1.0, 100_000_000, 10, 0);
        short.leverage = 10;
        assert_eq!(PositionManager::liquidation_price(&short, 0.005), (100_000_000.0 * (1.0 + 0.1 - 0.005)).round() as i64);
    }

    #[test]
    fn reserve_margin_fails_when_insufficient_available() {
        let pm = PositionManager::new();
        pm.deposit("alice", 100.0);
        assert!(pm.reserve_margin("alice", 50.0));
        assert!(!pm.reserve_margin("alice", 60.0));
    }
}
