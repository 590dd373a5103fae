//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Bar feeds (replayed files, synthetic streams)
//! - Emission sinks (structured log, JSON-lines storage)

pub mod market_data;
pub mod sink;

pub use market_data::{BarFeed, FeedError};
pub use sink::{EmissionSink, SinkError};

#[cfg(test)]
pub use sink::MockEmissionSink;
