//! Market Data Adapters
//!
//! Bar feeds implementing [`BarFeed`](crate::ports::BarFeed):
//! - `ReplayFeed`: newline-delimited kline / bar JSON files
//! - `SyntheticFeed`: seeded correlated random walks with an optional jump

pub mod replay;
pub mod synthetic;

pub use replay::ReplayFeed;
pub use synthetic::{standard_normal, JumpSpec, SyntheticConfig, SyntheticFeed};
