//! Closed Bars
//!
//! The only market input the pipeline consumes. A bar is handed over once
//! its interval has closed; partial (still-forming) klines never get here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

const MINUTE_MS: i64 = 60_000;

/// A closed price bar for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Upper-case ticker, e.g. "ETHUSDT"
    pub symbol: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub close_price: f64,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        close_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into().trim().to_ascii_uppercase(),
            open_time,
            close_time,
            close_price,
        }
    }

    /// Canonical close minute used as the pairing key.
    ///
    /// Exchanges stamp the close as the last millisecond of the interval
    /// (`..:59.999`), so one millisecond is added before flooring to the minute.
    pub fn minute(&self) -> DateTime<Utc> {
        let close_ms = self.close_time.timestamp_millis();
        let minute_secs = (close_ms + 1).div_euclid(MINUTE_MS) * 60;
        DateTime::<Utc>::from_timestamp(minute_secs, 0).unwrap_or(self.close_time)
    }

    /// Reject prices the return calculation cannot use.
    pub fn validate_price(&self) -> Result<(), PipelineError> {
        if self.close_price.is_finite() && self.close_price > 0.0 {
            Ok(())
        } else {
            Err(PipelineError::InvalidPrice {
                symbol: self.symbol.clone(),
                price: self.close_price,
            })
        }
    }
}
