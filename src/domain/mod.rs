//! Domain Layer - Core types for the residual monitor
//!
//! Pure data and arithmetic with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `bar`: closed per-minute bars and their canonical pairing minute
//! - `returns`: log-returns, interpolated percentiles, cumulative percent
//! - `signal`: emitted events and per-bar metrics records
//! - `error`: the per-bar error taxonomy

pub mod bar;
pub mod error;
pub mod returns;
pub mod signal;

pub use bar::Bar;
pub use error::PipelineError;
pub use returns::{cumulative_pct, log_return, percentile, ReturnObservation};
pub use signal::{
    round_pct, Direction, Emission, MetricsRecord, SignalEvent, SignalRecord, OWN_MOVE_EVENT,
};
