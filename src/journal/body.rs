//! Fixed-layout event bodies (spec.md §3 "Journal", §4.4). One variant per
//! event type listed in the spec's Journal data model.

use super::header::{read_fixed_str, write_fixed_str, CURRENCY_LEN, SYMBOL_LEN, USER_LEN};

#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    OrderNew { order_id: u64, symbol: String, user: String, side: u8, order_type: u8, price: i64, has_stop: bool, stop_price: i64, qty: f64, reduce_only: bool },
    Cancel { order_id: u64, symbol: String },
    Modify { order_id: u64, symbol: String, new_price: i64, new_qty: f64 },
    Trade { trade_id: u64, symbol: String, maker_order_id: u64, taker_order_id: u64, maker_user: String, taker_user: String, taker_side: u8, price: i64, qty: f64, maker_fee: f64, taker_fee: f64 },
    Deposit { user: String, currency: String, amount: f64 },
    Withdrawal { user: String, currency: String, amount: f64 },
    MarginLock { user: String, symbol: String, amount: f64 },
    MarginRelease { user: String, symbol: String, amount: f64 },
    Liquidation { user: String, symbol: String, size: f64, price: i64, realized_pnl: f64, insurance_draw: f64 },
    Funding { symbol: String, rate: f64 },
    Fee { user: String, symbol: String, amount: f64 },
    Insurance { symbol: String, amount: f64 },
    SystemStart,
    SystemStop,
    Snapshot { sequence: u64, path: String, content_hash: String },
}

impl EventBody {
    pub fn event_type(&self) -> super::header::EventType {
        use super::header::EventType::*;
        match self {
            EventBody::OrderNew { .. } => OrderNew,
            EventBody::Cancel { .. } => Cancel,
            EventBody::Modify { .. } => Modify,
            EventBody::Trade { .. } => Trade,
            EventBody::Deposit { .. } => Deposit,
            EventBody::Withdrawal { .. } => Withdrawal,
            EventBody::MarginLock { .. } => MarginLock,
            EventBody::MarginRelease { .. } => MarginRelease,
            EventBody::Liquidation { .. } => Liquidation,
            EventBody::Funding { .. } => Funding,
            EventBody::Fee { .. } => Fee,
            EventBody::Insurance { .. } => Insurance,
            EventBody::SystemStart => SystemStart,
            EventBody::SystemStop => SystemStop,
            EventBody::Snapshot { .. } => Snapshot,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            EventBody::OrderNew { order_id, symbol, user, side, order_type, price, has_stop, stop_price, qty, reduce_only } => {
                buf.extend_from_slice(&order_id.to_le_bytes());
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                write_fixed_str(&mut buf, user, USER_LEN);
                buf.push(*side);
                buf.push(*order_type);
                buf.push(*has_stop as u8);
                buf.push(*reduce_only as u8);
                buf.extend_from_slice(&price.to_le_bytes());
                buf.extend_from_slice(&stop_price.to_le_bytes());
                buf.extend_from_slice(&qty.to_le_bytes());
            }
            EventBody::Cancel { order_id, symbol } => {
                buf.extend_from_slice(&order_id.to_le_bytes());
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
            }
            EventBody::Modify { order_id, symbol, new_price, new_qty } => {
                buf.extend_from_slice(&order_id.to_le_bytes());
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&new_price.to_le_bytes());
                buf.extend_from_slice(&new_qty.to_le_bytes());
            }
            EventBody::Trade { trade_id, symbol, maker_order_id, taker_order_id, maker_user, taker_user, taker_side, price, qty, maker_fee, taker_fee } => {
                buf.extend_from_slice(&trade_id.to_le_bytes());
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&maker_order_id.to_le_bytes());
                buf.extend_from_slice(&taker_order_id.to_le_bytes());
                write_fixed_str(&mut buf, maker_user, USER_LEN);
                write_fixed_str(&mut buf, taker_user, USER_LEN);
                buf.push(*taker_side);
                buf.extend_from_slice(&price.to_le_bytes());
                buf.extend_from_slice(&qty.to_le_bytes());
                buf.extend_from_slice(&maker_fee.to_le_bytes());
                buf.extend_from_slice(&taker_fee.to_le_bytes());
            }
            EventBody::Deposit { user, currency, amount } | EventBody::Withdrawal { user, currency, amount } => {
                write_fixed_str(&mut buf, user, USER_LEN);
                write_fixed_str(&mut buf, currency, CURRENCY_LEN);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            EventBody::MarginLock { user, symbol, amount } | EventBody::MarginRelease { user, symbol, amount } => {
                write_fixed_str(&mut buf, user, USER_LEN);
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            EventBody::Liquidation { user, symbol, size, price, realized_pnl, insurance_draw } => {
                write_fixed_str(&mut buf, user, USER_LEN);
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&size.to_le_bytes());
                buf.extend_from_slice(&price.to_le_bytes());
                buf.extend_from_slice(&realized_pnl.to_le_bytes());
                buf.extend_from_slice(&insurance_draw.to_le_bytes());
            }
            EventBody::Funding { symbol, rate } => {
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&rate.to_le_bytes());
            }
            EventBody::Fee { user, symbol, amount } => {
                write_fixed_str(&mut buf, user, USER_LEN);
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            EventBody::Insurance { symbol, amount } => {
                write_fixed_str(&mut buf, symbol, SYMBOL_LEN);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            EventBody::SystemStart | EventBody::SystemStop => {}
            EventBody::Snapshot { sequence, path, content_hash } => {
                buf.extend_from_slice(&sequence.to_le_bytes());
                write_fixed_str(&mut buf, path, 64);
                write_fixed_str(&mut buf, content_hash, 32);
            }
        }
        buf
    }

    pub fn decode(event_type: super::header::EventType, buf: &[u8]) -> Result<Self, String> {
        use super::header::EventType as T;
        let err = |what: &str| format!("{what} body truncated ({} bytes)", buf.len());
        Ok(match event_type {
            T::OrderNew => {
                if buf.len() < 8 + SYMBOL_LEN + USER_LEN + 4 + 8 + 8 + 8 {
                    return Err(err("OrderNew"));
                }
                let mut i = 0;
                let order_id = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let symbol = read_fixed_str(&buf[i..i + SYMBOL_LEN]);
                i += SYMBOL_LEN;
                let user = read_fixed_str(&buf[i..i + USER_LEN]);
                i += USER_LEN;
                let side = buf[i];
                let order_type = buf[i + 1];
                let has_stop = buf[i + 2] != 0;
                let reduce_only = buf[i + 3] != 0;
                i += 4;
                let price = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let stop_price = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let qty = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                EventBody::OrderNew { order_id, symbol, user, side, order_type, price, has_stop, stop_price, qty, reduce_only }
            }
            T::Cancel => {
                if buf.len() < 8 + SYMBOL_LEN {
                    return Err(err("Cancel"));
                }
                let order_id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
                let symbol = read_fixed_str(&buf[8..8 + SYMBOL_LEN]);
                EventBody::Cancel { order_id, symbol }
            }
            T::Modify => {
                if buf.len() < 8 + SYMBOL_LEN + 16 {
                    return Err(err("Modify"));
                }
                let order_id = u64::from_le_bytes(buf[0..8].try_into().unwrap());
                let symbol = read_fixed_str(&buf[8..8 + SYMBOL_LEN]);
                let mut i = 8 + SYMBOL_LEN;
                let new_price = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let new_qty = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                EventBody::Modify { order_id, symbol, new_price, new_qty }
            }
            T::Trade => {
                let needed = 8 + SYMBOL_LEN + 8 + 8 + USER_LEN * 2 + 1 + 8 + 8 + 8 + 8;
                if buf.len() < needed {
                    return Err(err("Trade"));
                }
                let mut i = 0;
                let trade_id = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let symbol = read_fixed_str(&buf[i..i + SYMBOL_LEN]);
                i += SYMBOL_LEN;
                let maker_order_id = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let taker_order_id = u64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let maker_user = read_fixed_str(&buf[i..i + USER_LEN]);
                i += USER_LEN;
                let taker_user = read_fixed_str(&buf[i..i + USER_LEN]);
                i += USER_LEN;
                let taker_side = buf[i];
                i += 1;
                let price = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let qty = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let maker_fee = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let taker_fee = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                EventBody::Trade { trade_id, symbol, maker_order_id, taker_order_id, maker_user, taker_user, taker_side, price, qty, maker_fee, taker_fee }
            }
            T::Deposit | T::Withdrawal => {
                if buf.len() < USER_LEN + CURRENCY_LEN + 8 {
                    return Err(err("Deposit/Withdrawal"));
                }
                let user = read_fixed_str(&buf[0..USER_LEN]);
                let currency = read_fixed_str(&buf[USER_LEN..USER_LEN + CURRENCY_LEN]);
                let amount = f64::from_le_bytes(buf[USER_LEN + CURRENCY_LEN..USER_LEN + CURRENCY_LEN + 8].try_into().unwrap());
                if event_type == T::Deposit {
                    EventBody::Deposit { user, currency, amount }
                } else {
                    EventBody::Withdrawal { user, currency, amount }
                }
            }
            T::MarginLock | T::MarginRelease => {
                if buf.len() < USER_LEN + SYMBOL_LEN + 8 {
                    return Err(err("MarginLock/Release"));
                }
                let user = read_fixed_str(&buf[0..USER_LEN]);
                let symbol = read_fixed_str(&buf[USER_LEN..USER_LEN + SYMBOL_LEN]);
                let amount = f64::from_le_bytes(buf[USER_LEN + SYMBOL_LEN..USER_LEN + SYMBOL_LEN + 8].try_into().unwrap());
                if event_type == T::MarginLock {
                    EventBody::MarginLock { user, symbol, amount }
                } else {
                    EventBody::MarginRelease { user, symbol, amount }
                }
            }
            T::Liquidation => {
                if buf.len() < USER_LEN + SYMBOL_LEN + 32 {
                    return Err(err("Liquidation"));
                }
                let user = read_fixed_str(&buf[0..USER_LEN]);
                let symbol = read_fixed_str(&buf[USER_LEN..USER_LEN + SYMBOL_LEN]);
                let mut i = USER_LEN + SYMBOL_LEN;
                let size = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let price = i64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let realized_pnl = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                i += 8;
                let insurance_draw = f64::from_le_bytes(buf[i..i + 8].try_into().unwrap());
                EventBody::Liquidation { user, symbol, size, price, realized_pnl, insurance_draw }
            }
            T::Funding => {
                if buf.len() < SYMBOL_LEN + 8 {
                    return Err(err("Funding"));
                }
                let symbol = read_fixed_str(&buf[0..SYMBOL_LEN]);
                let rate = f64::from_le_bytes(buf[SYMBOL_LEN..SYMBOL_LEN + 8].try_into().unwrap());
                EventBody::Funding { symbol, rate }
            }
            T::Fee => {
                if buf.len() < USER_LEN + SYMBOL_LEN + 8 {
                    return Err(err("Fee"));
                }
                let user = read_fixed_str(&buf[0..USER_LEN]);
                let symbol = read_fixed_str(&buf[USER_LEN..USER_LEN + SYMBOL_LEN]);
                let amount = f64::from_le_bytes(buf[USER_LEN + SYMBOL_LEN..USER_LEN + SYMBOL_LEN + 8].try_into().unwrap());
                EventBody::Fee { user, symbol, amount }
            }
            T::Insurance => {
                if buf.len() < SYMBOL_LEN + 8 {
                    return Err(err("Insurance"));
                }
                let symbol = read_fixed_str(&buf[0..SYMBOL_LEN]);
                let amount = f64::from_le_bytes(buf[SYMBOL_LEN..SYMBOL_LEN + 8].try_into().unwrap());
                EventBody::Insurance { symbol, amount }
            }
            T::SystemStart => EventBody::SystemStart,
            T::SystemStop => EventBody::SystemStop,
            T::Snapshot => {
                if buf.len() < 8 + 64 + 32 {
                    return Err(err("Snapshot"));
                }
                let sequence = u64::from_le_bytes(buf[0..8].try_into().unwrap());
                let path = read_fixed_str(&buf[8..8 + 64]);
                let content_hash = read_fixed_str(&buf[8 + 64..8 + 64 + 32]);
                EventBody::Snapshot { sequence, path, content_hash }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::header::EventType;

    #[test]
    fn trade_body_round_trips() {
        let body = EventBody::Trade {
            trade_id: 1,
            symbol: "XAU-MNT-PERP".to_string(),
            maker_order_id: 10,
            taker_order_id: 11,
            maker_user: "bob".to_string(),
            taker_user: "alice".to_string(),
            taker_side: 0,
            price: 100_000_000,
            qty: 3.0,
            maker_fee: 0.06,
            taker_fee: 0.15,
        };
        let encoded = body.encode();
        let decoded = EventBody::decode(EventType::Trade, &encoded).unwrap();
        assert_eq!(body, decoded);
    }

    #[test]
    fn order_new_body_round_trips_with_stop() {
        let body = EventBody::OrderNew {
            order_id: 5,
            symbol: "XAU-MNT-PERP".to_string(),
            user: "alice".to_string(),
            side: 1,
            order_type: 5,
            price: 99_000_000,
            has_stop: true,
            stop_price: 98_000_000,
            qty: 2.5,
            reduce_only: false,
        };
        let decoded = EventBody::decode(EventType::OrderNew, &body.encode()).unwrap();
        assert_eq!(body, decoded);
    }

    #[test]
    fn system_start_has_empty_body() {
        assert!(EventBody::SystemStart.encode().is_empty());
    }
}
