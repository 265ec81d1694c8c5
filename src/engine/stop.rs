//! Stop-limit trigger book (spec.md §4.2.3 "Stop-limit orders").
//!
//! Stop orders rest outside the regular price-time book until the last
//! trade price crosses their `stop_price`, at which point they are fired
//! into the matching engine as ordinary limit orders in trigger-sequence
//! order. Builds on `primitives::LastPrice`'s atomic last-trade cell with a
//! side-indexed `BTreeMap` of pending triggers layered on top, mirroring how
//! `price_level.rs` factors level state out of `Book`.

use crate::order::Order;
use crate::primitives::Side;
use std::collections::BTreeMap;

/// Orders triggered by price crossing upward (buy stops) sit under their
/// `stop_price` ascending so the lowest threshold fires first; downward
/// stops (sell stops) sit descending so the highest threshold fires first.
#[derive(Debug, Default)]
pub struct StopBook {
    buy_stops: BTreeMap<i64, Vec<Order>>,
    sell_stops: BTreeMap<i64, Vec<Order>>,
}

impl StopBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        let stop_price = order.stop_price.expect("stop order must carry a stop_price");
        let map = match order.side {
            Side::Buy => &mut self.buy_stops,
            Side::Sell => &mut self.sell_stops,
        };
        map.entry(stop_price).or_default().push(order);
    }

    pub fn cancel(&mut self, order_id: u64) -> Option<Order> {
        for map in [&mut self.buy_stops, &mut self.sell_stops] {
            for (_, bucket) in map.iter_mut() {
                if let Some(pos) = bucket.iter().position(|o| o.id == order_id) {
                    return Some(bucket.remove(pos));
                }
            }
            map.retain(|_, bucket| !bucket.is_empty());
        }
        None
    }

    /// Pop every stop order whose threshold is crossed by the new last
    /// trade price, in trigger-sequence order: stops created earlier fire
    /// first regardless of which threshold or side they sit on (spec.md
    /// §4.2.3). `order.id` is monotonically assigned at creation
    /// (`IdGenerator`), so sorting the union of eligible buckets by id
    /// gives creation order directly.
    /// A caller that re-submits a fired order and causes a further trade
    /// must call this again: triggering is re-entrant until no more stops
    /// fire at the resulting price (spec.md §4.2.3).
    pub fn triggered(&mut self, last_trade_price: i64) -> Vec<Order> {
        let mut fired = Vec::new();

        let buy_keys: Vec<i64> = self.buy_stops.range(..=last_trade_price).map(|(p, _)| *p).collect();
        for key in buy_keys {
            if let Some(bucket) = self.buy_stops.remove(&key) {
                fired.extend(bucket);
            }
        }

        let sell_keys: Vec<i64> = self.sell_stops.range(last_trade_price..).map(|(p, _)| *p).collect();
        for key in sell_keys {
            if let Some(bucket) = self.sell_stops.remove(&key) {
                fired.extend(bucket);
            }
        }

        fired.sort_by_key(|o| o.id);
        fired
    }

    pub fn pending_count(&self) -> usize {
        self.buy_stops.values().map(|v| v.len()).sum::<usize>()
            + self.sell_stops.values().map(|v| v.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderType;

    fn stop(id: u64, side: Side, stop_price: i64, limit_price: i64) -> Order {
        Order::new(id, "SYM", "u", side, OrderType::StopLimit, limit_price, Some(stop_price), 1.0, false, None, 0)
    }

    #[test]
    fn buy_stop_fires_when_price_rises_to_threshold() {
        let mut book = StopBook::new();
        book.insert(stop(1, Side::Buy, 110, 111));
        assert!(book.triggered(109).is_empty());
        let fired = book.triggered(110);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, 1);
    }

    #[test]
    fn sell_stop_fires_when_price_falls_to_threshold() {
        let mut book = StopBook::new();
        book.insert(stop(1, Side::Sell, 90, 89));
        assert!(book.triggered(91).is_empty());
        let fired = book.triggered(90);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn cancel_removes_pending_stop() {
        let mut book = StopBook::new();
        book.insert(stop(1, Side::Buy, 110, 111));
        assert!(book.cancel(1).is_some());
        assert_eq!(book.pending_count(), 0);
        assert!(book.triggered(200).is_empty());
    }

    #[test]
    fn multiple_thresholds_fire_in_order_up_to_last_trade() {
        let mut book = StopBook::new();
        book.insert(stop(1, Side::Buy, 100, 101));
        book.insert(stop(2, Side::Buy, 105, 106));
        let fired = book.triggered(105);
        assert_eq!(fired.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn later_created_lower_threshold_still_fires_after_earlier_higher_one() {
        // order 1 was created first but sits at the higher (later-crossed)
        // threshold; order 2 was created second at a lower threshold that
        // the same price move also crosses. Trigger sequence order means
        // creation order wins, not threshold order.
        let mut book = StopBook::new();
        book.insert(stop(1, Side::Buy, 105, 106));
        book.insert(stop(2, Side::Buy, 100, 101));
        let fired = book.triggered(105);
        assert_eq!(fired.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
