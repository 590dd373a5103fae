//! Binance payload decoding (no network client)

mod kline;

pub use kline::decode_line;
