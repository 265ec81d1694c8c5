//! Error taxonomy for the core, grounded in the teacher's
//! `services::matching::types::MatchingError` and expanded per spec.md §7
//! into the four kinds the spec calls out: validation, business-rule,
//! state-conflict, and durability/invariant failures.

use thiserror::Error;

/// Errors returned synchronously by `CoreContext` request-surface methods
/// (spec.md §6). Validation and business-rule failures carry no side effect;
/// state-conflict failures are informational. `Durability` and
/// `InvariantViolation` are FATAL per spec.md §7 and should halt the affected
/// symbol rather than be swallowed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("symbol not found or inactive: {0}")]
    InvalidSymbol(String),

    #[error("invalid size for {symbol}: {qty} (min {min}, max {max})")]
    InvalidSize { symbol: String, qty: f64, min: f64, max: f64 },

    #[error("invalid price for {symbol}: {price} (tick {tick})")]
    InvalidPrice { symbol: String, price: i64, tick: i64 },

    #[error("insufficient margin: available {available:.6}, required {required:.6}")]
    InsufficientMargin { available: f64, required: f64 },

    #[error("reduce-only order would increase or flip position")]
    ReduceOnlyViolation,

    #[error("post-only order would cross the book at {0}")]
    PostOnlyCross(String),

    #[error("fill-or-kill order cannot be filled in full")]
    FokUnfillable,

    #[error("order not found: {0}")]
    NotFound(u64),

    #[error("user {user} does not own order {order_id}")]
    NotOwner { order_id: u64, user: String },

    #[error("order {0} is already in a terminal state")]
    AlreadyTerminal(u64),

    #[error("invalid modification: {0}")]
    InvalidModification(String),

    #[error("no open position for {user} on {symbol}")]
    NoPosition { user: String, symbol: String },

    /// Durability failure (journal write/fsync). FATAL per spec.md §7: the
    /// engine must halt taker processing for the affected symbol.
    #[error("journal durability failure: {0}")]
    Durability(String),

    /// Invariant violated at runtime (crossed book, negative remaining,
    /// margin underflow). FATAL; recovery is via restart + replay.
    #[error("invariant violation in {symbol}: {detail}")]
    InvariantViolation { symbol: String, detail: String },
}

impl CoreError {
    /// `true` for the two error kinds spec.md §7 marks FATAL: these should
    /// propagate out of `CoreContext` unconditionally rather than being
    /// handled as a structured per-request error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Durability(_) | CoreError::InvariantViolation { .. })
    }

    /// External error-code mapping from spec.md §6.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::InvalidSymbol(_)
            | CoreError::InvalidSize { .. }
            | CoreError::InvalidPrice { .. }
            | CoreError::InvalidModification(_) => 400,
            CoreError::NotFound(_) | CoreError::NoPosition { .. } => 404,
            CoreError::NotOwner { .. }
            | CoreError::AlreadyTerminal(_)
            | CoreError::ReduceOnlyViolation
            | CoreError::PostOnlyCross(_) => 409,
            CoreError::InsufficientMargin { .. } | CoreError::FokUnfillable => 422,
            CoreError::Durability(_) | CoreError::InvariantViolation { .. } => 500,
        }
    }
}
