//! Product Catalog — read-mostly symbol metadata.
//!
//! Supplies `{tick, min/max size, leverage, mark price, active flag}` per
//! symbol (spec.md §2.4). Updates (activate/halt, mark-price refresh) take a
//! brief write-lock; the engine reads a cheap snapshot once per request
//! (spec.md §5 "Shared resources"). Grounded in the teacher's `dashmap`-backed
//! concurrent maps (`services/matching/orderbook.rs`); loading the catalog
//! from an external metadata service is out of scope (spec.md §1) so
//! `ProductCatalog` is always pre-populated by the caller.

use dashmap::DashMap;

/// Per-symbol metadata snapshot. Cheap to clone; the engine takes one copy
/// per request rather than holding the catalog lock across a match.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub tick_size: i64,
    pub min_size: f64,
    pub max_size: f64,
    pub leverage: u32,
    pub maintenance_margin_ratio: f64,
    /// Mark price in micro-units, injected by an external oracle loop
    /// (spec.md §9 Open Questions: update frequency/source not specified).
    pub mark_price: i64,
    pub active: bool,
}

impl SymbolInfo {
    pub fn new(symbol: impl Into<String>, tick_size: i64, min_size: f64, max_size: f64, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            min_size,
            max_size,
            leverage,
            maintenance_margin_ratio: 0.005,
            mark_price: 0,
            active: true,
        }
    }
}

/// Product Catalog: read-mostly symbol table.
pub struct ProductCatalog {
    symbols: DashMap<String, SymbolInfo>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self { symbols: DashMap::new() }
    }

    pub fn with_symbols(infos: impl IntoIterator<Item = SymbolInfo>) -> Self {
        let catalog = Self::new();
        for info in infos {
            catalog.symbols.insert(info.symbol.clone(), info);
        }
        catalog
    }

    /// Snapshot of `(tick, leverage, mark, active, min/max)` for one symbol.
    pub fn get(&self, symbol: &str) -> Option<SymbolInfo> {
        self.symbols.get(symbol).map(|e| e.value().clone())
    }

    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().map(|e| e.key().clone()).collect()
    }

    pub fn set_active(&self, symbol: &str, active: bool) -> bool {
        if let Some(mut entry) = self.symbols.get_mut(symbol) {
            entry.active = active;
            true
        } else {
            false
        }
    }

    pub fn update_mark_price(&self, symbol: &str, mark_price: i64) -> bool {
        if let Some(mut entry) = self.symbols.get_mut(symbol) {
            entry.mark_price = mark_price;
            true
        } else {
            false
        }
    }

    pub fn insert(&self, info: SymbolInfo) {
        self.symbols.insert(info.symbol.clone(), info);
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}
