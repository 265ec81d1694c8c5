//! Crash recovery (spec.md §4.5): snapshot + journal replay.
//!
//! On restart, the most recent snapshot is loaded (if any) to restore
//! accounts and positions in one step, then every journal record after the
//! snapshot's sequence is replayed to reconstruct resting order book state
//! and catch up position changes the snapshot predates. `MatchingEngine`
//! runs with `replaying = true` for the duration so replayed trades are not
//! re-appended to the journal they came from.
//!
//! Grounded in the teacher's `Sentinel::recover` (`nexus_core::persistence`),
//! adapted from its mmap WAL cursor to this crate's `JournalReader`.

use crate::engine::MatchingEngine;
use crate::journal::snapshot::{read_snapshot, verify_snapshot, SnapshotData};
use crate::journal::{EventBody, JournalReader};
use crate::order::{Order, OrderStatus, OrderType};
use crate::position::PositionManager;
use crate::primitives::{is_zero_qty, Side};
use std::collections::HashMap;
use std::io;
use std::path::Path;

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub snapshot_sequence: Option<u64>,
    pub replayed_events: usize,
    pub restored_resting_orders: usize,
    pub truncated_tail: bool,
}

/// Runs recovery against an already-constructed `MatchingEngine` and
/// `PositionManager` backed by an empty journal reader. Returns once every
/// durable record has been applied; the caller then sets `replaying` back
/// to `false` and resumes live traffic.
pub fn recover(
    engine: &MatchingEngine,
    positions: &PositionManager,
    journal_path: impl AsRef<Path>,
    snapshot_path: Option<(&Path, &str)>,
) -> io::Result<RecoveryReport> {
    engine.set_replaying(true);
    let mut report = RecoveryReport::default();

    let snapshot_sequence = if let Some((path, expected_hash)) = snapshot_path {
        if verify_snapshot(path, expected_hash)? {
            let data: SnapshotData = read_snapshot(path)?;
            positions.restore(data.positions, data.accounts);
            for (symbol, order) in &data.open_orders {
                let _ = symbol;
                engine.restore_resting_order(order.clone());
            }
            report.snapshot_sequence = Some(data.sequence);
            data.sequence
        } else {
            0
        }
    } else {
        0
    };

    let mut reader = JournalReader::open(&journal_path)?;
    let records = reader.read_all()?;
    report.truncated_tail = reader.truncated_at.is_some();

    let mut live_orders: HashMap<u64, Order> = HashMap::new();

    for (event_header, body) in records.iter().filter(|(h, _)| h.sequence > snapshot_sequence) {
        report.replayed_events += 1;
        match body {
            EventBody::OrderNew { order_id, symbol, user, side, order_type, price, has_stop, stop_price, qty, reduce_only } => {
                let side = if *side == 0 { Side::Buy } else { Side::Sell };
                let order_type = decode_order_type(*order_type);
                let stop_price = if *has_stop { Some(*stop_price) } else { None };
                let order = Order::new(*order_id, symbol.clone(), user.clone(), side, order_type, *price, stop_price, *qty, *reduce_only, None, event_header.timestamp_ns);
                live_orders.insert(*order_id, order);
            }
            EventBody::Cancel { order_id, .. } => {
                live_orders.remove(order_id);
            }
            EventBody::Trade { maker_order_id, taker_order_id, maker_user, taker_user, symbol, taker_side, price, qty, .. } => {
                let taker_side = if *taker_side == 0 { Side::Buy } else { Side::Sell };
                if let Some(order) = live_orders.get_mut(maker_order_id) {
                    order.apply_fill(*qty, event_header.timestamp_ns);
                    if order.status == OrderStatus::Filled {
                        live_orders.remove(maker_order_id);
                    }
                }
                if let Some(order) = live_orders.get_mut(taker_order_id) {
                    order.apply_fill(*qty, event_header.timestamp_ns);
                    if order.status == OrderStatus::Filled {
                        live_orders.remove(taker_order_id);
                    }
                }
                let leverage = 1;
                let maker_signed = if taker_side == Side::Buy { -*qty } else { *qty };
                positions.apply_fill(maker_user, symbol, maker_signed, *price, leverage, event_header.timestamp_ns);
                positions.apply_fill(taker_user, symbol, -maker_signed, *price, leverage, event_header.timestamp_ns);
            }
            EventBody::Deposit { user, amount, .. } => {
                positions.deposit(user, *amount);
            }
            EventBody::Withdrawal { user, amount, .. } => {
                positions.withdraw(user, *amount);
            }
            EventBody::Fee { user, amount, .. } => {
                positions.debit_fee(user, *amount);
            }
            _ => {}
        }
    }

    for (_, order) in live_orders {
        if !is_zero_qty(order.remaining_qty) && matches!(order.order_type, OrderType::Limit | OrderType::PostOnly) {
            report.restored_resting_orders += 1;
            engine.restore_resting_order(order);
        }
    }

    engine.set_replaying(false);
    tracing::info!(
        replayed_events = report.replayed_events,
        restored_resting_orders = report.restored_resting_orders,
        truncated_tail = report.truncated_tail,
        "recovery complete"
    );
    Ok(report)
}

fn decode_order_type(code: u8) -> OrderType {
    match code {
        0 => OrderType::Market,
        1 => OrderType::Limit,
        2 => OrderType::Ioc,
        3 => OrderType::Fok,
        4 => OrderType::PostOnly,
        _ => OrderType::StopLimit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ProductCatalog, SymbolInfo};
    use crate::journal::JournalWriter;
    use crate::order::OrderType;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn replay_rebuilds_a_resting_order_from_journal() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("events.journal");

        {
            let writer = JournalWriter::open(&journal_path).unwrap();
            writer.append(1, &EventBody::OrderNew {
                order_id: 1,
                symbol: "SYM".into(),
                user: "bob".into(),
                side: 1,
                order_type: 1,
                price: 100,
                has_stop: false,
                stop_price: 0,
                qty: 5.0,
                reduce_only: false,
            }).unwrap();
        }

        let catalog = Arc::new(ProductCatalog::with_symbols([SymbolInfo::new("SYM", 1, 0.001, 1000.0, 10)]));
        let positions = Arc::new(PositionManager::new());
        let live_writer = Arc::new(JournalWriter::open(dir.path().join("live.journal")).unwrap());
        let engine = MatchingEngine::new(catalog, positions.clone(), live_writer);

        let report = recover(&engine, &positions, &journal_path, None).unwrap();
        assert_eq!(report.replayed_events, 1);
        assert_eq!(report.restored_resting_orders, 1);
        assert_eq!(engine.get_bbo("SYM").unwrap().1, Some(100));
    }

    #[test]
    fn replay_drops_fully_filled_orders() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("events.journal");
        {
            let writer = JournalWriter::open(&journal_path).unwrap();
            writer.append(1, &EventBody::OrderNew {
                order_id: 1, symbol: "SYM".into(), user: "bob".into(), side: 1,
                order_type: OrderType::Limit as u8, price: 100, has_stop: false, stop_price: 0, qty: 5.0, reduce_only: false,
            }).unwrap();
            writer.append(2, &EventBody::Trade {
                trade_id: 1, symbol: "SYM".into(), maker_order_id: 1, taker_order_id: 99,
                maker_user: "bob".into(), taker_user: "alice".into(), taker_side: 0,
                price: 100, qty: 5.0, maker_fee: 0.0, taker_fee: 0.0,
            }).unwrap();
        }

        let catalog = Arc::new(ProductCatalog::with_symbols([SymbolInfo::new("SYM", 1, 0.001, 1000.0, 10)]));
        let positions = Arc::new(PositionManager::new());
        let live_writer = Arc::new(JournalWriter::open(dir.path().join("live.journal")).unwrap());
        let engine = MatchingEngine::new(catalog, positions.clone(), live_writer);

        let report = recover(&engine, &positions, &journal_path, None).unwrap();
        assert_eq!(report.restored_resting_orders, 0);
        assert_eq!(engine.get_bbo("SYM").unwrap(), (None, None));
        assert_eq!(positions.position("bob", "SYM").unwrap().size, -5.0);
    }
}
