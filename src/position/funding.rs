//! Periodic funding rate settlement for perpetual positions.
//!
//! Not named by spec.md's core component list, but the teacher's
//! `api/handlers/funding_rate.rs` references a `funding_rate_service`
//! exposing exactly this surface, so it is carried into the derivatives
//! scope as a supplementary feature (SPEC_FULL.md §C). Settlement debits or
//! credits each position's holder directly against their cash balance — no
//! separate funding ledger, matching the spec's flat-fee-schedule treatment
//! of fees in §4.2.

use super::PositionManager;
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FundingRateInfo {
    pub symbol: String,
    pub rate: f64,
    pub timestamp: u64,
    pub next_funding_time: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingSettlement {
    pub user: String,
    pub symbol: String,
    pub rate: f64,
    pub position_size: f64,
    pub amount: f64,
    pub timestamp: u64,
}

/// Interval between funding settlements, matching typical perpetual-swap
/// cadence; the spec leaves the policy configurable (§9).
pub const FUNDING_INTERVAL_NS: u64 = 8 * 60 * 60 * 1_000_000_000;

pub struct FundingEngine {
    rates: DashMap<String, FundingRateInfo>,
    history: DashMap<String, Vec<FundingRateInfo>>,
    settlements: DashMap<String, Vec<FundingSettlement>>,
}

impl FundingEngine {
    pub fn new() -> Self {
        Self { rates: DashMap::new(), history: DashMap::new(), settlements: DashMap::new() }
    }

    pub fn set_rate(&self, symbol: &str, rate: f64, now: u64) {
        let info = FundingRateInfo { symbol: symbol.to_string(), rate, timestamp: now, next_funding_time: now + FUNDING_INTERVAL_NS };
        self.history.entry(symbol.to_string()).or_default().push(info.clone());
        self.rates.insert(symbol.to_string(), info);
    }

    pub fn current_rate(&self, symbol: &str) -> Option<FundingRateInfo> {
        self.rates.get(symbol).map(|v| v.clone())
    }

    pub fn all_rates(&self) -> Vec<FundingRateInfo> {
        self.rates.iter().map(|e| e.value().clone()).collect()
    }

    pub fn history(&self, symbol: &str, limit: usize) -> Vec<FundingRateInfo> {
        self.history.get(symbol).map(|v| v.iter().rev().take(limit).cloned().collect()).unwrap_or_default()
    }

    /// Settles funding for every open position in `symbol`: longs pay
    /// shorts when `rate > 0`, and vice versa. `mark_price` values the
    /// notional; positions hold cash balances on `PositionManager`, so
    /// settlement is a direct cash debit/credit there.
    pub fn settle(&self, positions: &PositionManager, symbol: &str, rate: f64, mark_price: i64, now: u64) -> Vec<FundingSettlement> {
        let mut settled = Vec::new();
        for pos in positions.positions_for_symbol(symbol) {
            let notional = pos.size.abs() * mark_price as f64;
            let amount = -pos.size.signum() * notional * rate;
            if amount >= 0.0 {
                positions.deposit(&pos.user, amount);
            } else {
                positions.debit_fee(&pos.user, -amount);
            }
            let record = FundingSettlement { user: pos.user.clone(), symbol: symbol.to_string(), rate, position_size: pos.size, amount, timestamp: now };
            self.settlements.entry(pos.user.clone()).or_default().push(record.clone());
            settled.push(record);
        }
        settled
    }

    pub fn user_settlements(&self, user: &str, limit: usize) -> Vec<FundingSettlement> {
        self.settlements.get(user).map(|v| v.iter().rev().take(limit).cloned().collect()).unwrap_or_default()
    }
}

impl Default for FundingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rate_debits_longs_and_credits_shorts() {
        let pm = PositionManager::new();
        pm.apply_fill("long_user", "SYM", 10.0, 100_000_000, 10, 0);
        pm.apply_fill("short_user", "SYM", -10.0, 100_000_000, 10, 0);
        let funding = FundingEngine::new();
        funding.settle(&pm, "SYM", 0.0001, 100_000_000, 1);
        let long_account = pm.account("long_user");
        let short_account = pm.account("short_user");
        assert!(long_account.cash_balance < 0.0, "long should pay funding at a positive rate");
        assert!(short_account.cash_balance > 0.0, "short should receive funding at a positive rate");
    }
}
