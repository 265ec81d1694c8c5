//! Insurance Fund and liquidation bookkeeping (spec.md §4.3, §9 "Insurance-fund
//! funding rules ... left configurable"). Types are authored from the
//! handler usage in `api/handlers/liquidation.rs` (`InsuranceFund`,
//! `LiquidationConfig`, `LiquidationRecord`), which the retrieved pack
//! references but does not define.

use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct InsuranceFund {
    pub symbol: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidationConfig {
    pub symbol: String,
    pub maintenance_margin_ratio: f64,
    /// Fee charged on the notional of a forced close, credited to the fund.
    pub liquidation_fee_rate: f64,
}

impl LiquidationConfig {
    pub fn new(symbol: impl Into<String>, maintenance_margin_ratio: f64) -> Self {
        Self { symbol: symbol.into(), maintenance_margin_ratio, liquidation_fee_rate: 0.005 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidationRecord {
    pub id: u64,
    pub user: String,
    pub symbol: String,
    pub size: f64,
    pub price: i64,
    pub realized_pnl: f64,
    pub insurance_draw: f64,
    pub timestamp: u64,
}

/// Per-symbol Insurance Fund balances plus liquidation history, behind one
/// `DashMap` each (spec.md §5: "Insurance Fund balance is a single
/// mutex-protected account" — generalized here to per-symbol funds since
/// the spec's own event list tracks fund contributions per market).
pub struct InsuranceFundStore {
    funds: DashMap<String, f64>,
    history: DashMap<String, Vec<LiquidationRecord>>,
}

impl InsuranceFundStore {
    pub fn new() -> Self {
        Self { funds: DashMap::new(), history: DashMap::new() }
    }

    pub fn get(&self, symbol: &str) -> InsuranceFund {
        let balance = self.funds.get(symbol).map(|v| *v).unwrap_or(0.0);
        InsuranceFund { symbol: symbol.to_string(), balance }
    }

    pub fn contribute(&self, symbol: &str, amount: f64) {
        *self.funds.entry(symbol.to_string()).or_insert(0.0) += amount;
    }

    /// Draws up to `amount` from the fund, returning what was actually
    /// available (may be less than requested if the fund is depleted).
    pub fn draw(&self, symbol: &str, amount: f64) -> f64 {
        let mut balance = self.funds.entry(symbol.to_string()).or_insert(0.0);
        let drawn = amount.min(*balance).max(0.0);
        *balance -= drawn;
        drawn
    }

    pub fn record_liquidation(&self, record: LiquidationRecord) {
        self.history.entry(record.symbol.clone()).or_default().push(record);
    }

    pub fn liquidations_for_symbol(&self, symbol: &str, limit: usize) -> Vec<LiquidationRecord> {
        self.history.get(symbol).map(|v| v.iter().rev().take(limit).cloned().collect()).unwrap_or_default()
    }

    pub fn liquidations_for_user(&self, user: &str, limit: usize) -> Vec<LiquidationRecord> {
        let mut all: Vec<LiquidationRecord> =
            self.history.iter().flat_map(|e| e.value().clone()).filter(|r| r.user == user).collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        all
    }
}

impl Default for InsuranceFundStore {
    fn default() -> Self {
        Self::new()
    }
}
