//! Auto-deleveraging (ADL) ranking and forced reduction.
//!
//! Supplementary feature authored from `api/handlers/adl.rs`'s
//! `AdlConfig`/`AdlRanking`/`AdlEvent`/`AdlReduction`/`UserAdlStats` usage
//! sites. When the Insurance Fund cannot absorb a liquidation's shortfall
//! (spec.md §4.3 "may draw from Insurance Fund if realized < −margin_used"),
//! the exchange falls back to reducing the most-profitable, highest-leverage
//! opposite-side positions against the liquidated size.

use super::PositionManager;
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AdlConfig {
    pub symbol: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdlRanking {
    pub user: String,
    pub symbol: String,
    /// Higher ranks are deleveraged first: profit ratio × leverage, the
    /// conventional ADL priority score.
    pub rank_score: f64,
    pub position_size: f64,
    pub leverage: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdlEvent {
    pub id: u64,
    pub symbol: String,
    pub side: String,
    pub timestamp: u64,
    pub reduced_quantity: f64,
    pub counterparty_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdlReduction {
    pub user: String,
    pub symbol: String,
    pub quantity: f64,
    pub price: i64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UserAdlStats {
    pub user: String,
    pub symbol: String,
    pub times_adl_ed: u32,
    pub total_reduced_qty: f64,
}

pub struct AdlEngine {
    configs: DashMap<String, AdlConfig>,
    events: DashMap<String, Vec<AdlEvent>>,
    reductions: DashMap<String, Vec<AdlReduction>>,
    stats: DashMap<(String, String), UserAdlStats>,
}

impl AdlEngine {
    pub fn new() -> Self {
        Self { configs: DashMap::new(), events: DashMap::new(), reductions: DashMap::new(), stats: DashMap::new() }
    }

    pub fn config(&self, symbol: &str) -> AdlConfig {
        self.configs.get(symbol).map(|v| v.clone()).unwrap_or_else(|| AdlConfig { symbol: symbol.to_string(), enabled: true })
    }

    pub fn set_config(&self, config: AdlConfig) {
        self.configs.insert(config.symbol.clone(), config);
    }

    /// Ranks every position on `side` ("long" or "short") in `symbol` by
    /// `unrealized_pnl / margin_used × leverage`, descending.
    pub fn rankings(&self, positions: &PositionManager, symbol: &str, side: &str, limit: usize) -> Vec<AdlRanking> {
        let mut ranked: Vec<AdlRanking> = positions
            .positions_for_symbol(symbol)
            .into_iter()
            .filter(|p| if side == "long" { p.size > 0.0 } else { p.size < 0.0 })
            .map(|p| {
                let profit_ratio = if p.margin_used > 0.0 { p.unrealized_pnl / p.margin_used } else { 0.0 };
                AdlRanking {
                    user: p.user,
                    symbol: p.symbol,
                    rank_score: profit_ratio * p.leverage as f64,
                    position_size: p.size,
                    leverage: p.leverage,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.rank_score.partial_cmp(&a.rank_score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        ranked
    }

    /// Walks the ranking highest-first, closing `qty` against each
    /// counterparty's position at `price` until the liquidated size is
    /// fully absorbed.
    pub fn reduce_top(
        &self,
        positions: &PositionManager,
        symbol: &str,
        side: &str,
        mut qty: f64,
        price: i64,
        now: u64,
        next_event_id: impl FnOnce() -> u64,
    ) -> AdlEvent {
        let ranking = self.rankings(positions, symbol, side, usize::MAX);
        let mut reductions = Vec::new();

        for rank in ranking {
            if qty <= 0.0 {
                break;
            }
            let take = qty.min(rank.position_size.abs());
            let signed = -take * rank.position_size.signum();
            positions.apply_fill(&rank.user, symbol, signed, price, rank.leverage, now);
            qty -= take;

            let reduction = AdlReduction { user: rank.user.clone(), symbol: symbol.to_string(), quantity: take, price, timestamp: now };
            self.reductions.entry(rank.user.clone()).or_default().push(reduction.clone());
            let mut entry = self
                .stats
                .entry((rank.user.clone(), symbol.to_string()))
                .or_insert_with(|| UserAdlStats { user: rank.user.clone(), symbol: symbol.to_string(), ..Default::default() });
            entry.times_adl_ed += 1;
            entry.total_reduced_qty += take;
            reductions.push(reduction);
        }

        let event = AdlEvent {
            id: next_event_id(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            timestamp: now,
            reduced_quantity: reductions.iter().map(|r| r.quantity).sum(),
            counterparty_count: reductions.len(),
        };
        self.events.entry(symbol.to_string()).or_default().push(event.clone());
        event
    }

    pub fn market_history(&self, symbol: &str, limit: usize) -> Vec<AdlEvent> {
        self.events.get(symbol).map(|v| v.iter().rev().take(limit).cloned().collect()).unwrap_or_default()
    }

    pub fn user_history(&self, user: &str, limit: usize) -> Vec<AdlReduction> {
        self.reductions.get(user).map(|v| v.iter().rev().take(limit).cloned().collect()).unwrap_or_default()
    }

    pub fn user_stats(&self, user: &str, symbol: &str) -> Option<UserAdlStats> {
        self.stats.get(&(user.to_string(), symbol.to_string())).map(|v| v.clone())
    }
}

impl Default for AdlEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rankings_sort_by_profit_times_leverage_descending() {
        let pm = PositionManager::new();
        pm.apply_fill("a", "SYM", 5.0, 100_000_000, 5, 0);
        pm.apply_fill("b", "SYM", 3.0, 100_000_000, 20, 0);
        pm.mark_to_market("SYM", 150_000_000, 0.005);

        let adl = AdlEngine::new();
        let ranks = adl.rankings(&pm, "SYM", "long", 10);
        assert_eq!(ranks[0].user, "b", "higher leverage at equal relative profit ranks first");
    }

    #[test]
    fn reduce_top_walks_ranking_until_quantity_absorbed() {
        let pm = PositionManager::new();
        pm.apply_fill("a", "SYM", 5.0, 100_000_000, 10, 0);
        pm.mark_to_market("SYM", 120_000_000, 0.005);
        let adl = AdlEngine::new();
        let event = adl.reduce_top(&pm, "SYM", "long", 5.0, 120_000_000, 5, || 1);
        assert_eq!(event.reduced_quantity, 5.0);
        assert!(pm.position("a", "SYM").unwrap().is_flat());
    }
}
