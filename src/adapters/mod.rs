//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Binance: kline payload decoding into closed bars
//! - Market Data: replay and synthetic bar feeds
//! - Sinks: structured-log and JSON-lines emission sinks
//! - CLI: Command-line interface definitions

pub mod binance;
pub mod cli;
pub mod market_data;
pub mod sinks;

pub use cli::CliApp;
pub use market_data::{ReplayFeed, SyntheticConfig, SyntheticFeed};
pub use sinks::{JsonlSink, LogSink};
