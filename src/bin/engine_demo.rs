//! Minimal binary wiring for the matching engine core: loads configuration,
//! initializes tracing, builds a `CoreContext`, replays the journal if one
//! exists, then runs a handful of orders against a demo symbol so the
//! journal/book/position wiring can be exercised end to end.
//!
//! Mirrors the shape of the teacher's `main.rs` (tracing init, dotenv,
//! `AppConfig::load()`, service construction) with the HTTP/WebSocket
//! surface removed — this binary is the synchronous core on its own.

use clob_engine::catalog::{ProductCatalog, SymbolInfo};
use clob_engine::config::AppConfig;
use clob_engine::context::CoreContext;
use clob_engine::journal::JournalWriter;
use clob_engine::order::OrderType;
use clob_engine::recovery;
use clob_engine::Side;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "clob_engine=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    tracing::info!(environment = %config.environment, "starting engine_demo");

    std::fs::create_dir_all(&config.journal.snapshot_dir)?;
    let journal_path = Path::new(&config.journal.journal_path);
    if let Some(parent) = journal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let catalog = ProductCatalog::new();
    catalog.insert(SymbolInfo::new("XAU-MNT-PERP", 1_000_000, 0.001, 1000.0, 20));

    let journal_existed = journal_path.exists();
    let journal = JournalWriter::open(journal_path)?;
    let ctx = CoreContext::new(catalog, journal);
    let _flush_worker = ctx.spawn_flush_worker(std::time::Duration::from_millis(50));

    if journal_existed {
        let report = recovery::recover(&ctx.engine, &ctx.positions, journal_path, None)?;
        tracing::info!(replayed = report.replayed_events, resting = report.restored_resting_orders, "recovered from journal");
    }

    ctx.deposit("alice", 1_000_000_000.0)?;
    ctx.deposit("bob", 1_000_000_000.0)?;

    ctx.submit_order("XAU-MNT-PERP", "bob", Side::Sell, OrderType::Limit, 2_700_000_000, None, 2.0, false, None)?;
    let outcome = ctx.submit_order("XAU-MNT-PERP", "alice", Side::Buy, OrderType::Market, 0, None, 1.0, false, None)?;
    tracing::info!(trades = outcome.trades.len(), "demo order matched");

    if let Some((bid, ask)) = ctx.get_bbo("XAU-MNT-PERP") {
        tracing::info!(?bid, ?ask, "book state after demo trade");
    }

    let (sequence, path) = ctx.take_snapshot(Path::new(&config.journal.snapshot_dir))?;
    tracing::info!(sequence, path = %path.display(), "wrote snapshot");

    ctx.journal.flush()?;
    Ok(())
}
