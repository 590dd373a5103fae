//! Pipeline Errors
//!
//! Every variant except `ResourceExhausted` is local to a single bar: the
//! offending input is rejected and the pipeline carries on with the next one.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("invalid price for {symbol}: {price} (must be finite and > 0)")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("out-of-order bar for {symbol}: close {close_time} <= last accepted {last_close_time}")]
    OutOfOrder {
        symbol: String,
        close_time: DateTime<Utc>,
        last_close_time: DateTime<Utc>,
    },

    #[error("missing {missing} leg at {minute}: only {present} arrived before the pairing deadline")]
    MissingLegTimeout {
        minute: DateTime<Utc>,
        present: String,
        missing: String,
    },

    #[error("symbol {0} is not part of this pair")]
    UnknownSymbol(String),

    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),

    #[error("unable to reserve {requested} slots for {buffer}")]
    ResourceExhausted { buffer: &'static str, requested: usize },
}

impl PipelineError {
    /// Only allocation failures stop the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::ResourceExhausted { .. })
    }
}

/// Reserve exact capacity up front so an allocation failure surfaces at
/// construction time instead of mid-stream.
pub(crate) fn reserve_window<T>(
    buffer: &'static str,
    capacity: usize,
) -> Result<std::collections::VecDeque<T>, PipelineError> {
    let mut window = std::collections::VecDeque::new();
    window
        .try_reserve_exact(capacity + 1)
        .map_err(|_| PipelineError::ResourceExhausted {
            buffer,
            requested: capacity,
        })?;
    Ok(window)
}
