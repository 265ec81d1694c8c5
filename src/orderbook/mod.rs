//! Per-symbol order book: price levels plus the FIFO queues inside them.

pub mod book;
pub mod price_level;

pub use book::{Book, DepthSnapshot, InsertResult};
pub use price_level::PriceLevel;
