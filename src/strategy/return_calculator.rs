//! Return Calculator
//!
//! Turns consecutive closes of one asset into log-returns and winsorizes
//! each new return against the trailing distribution of raw returns.
//!
//! The clip bounds are the configured percentiles (default 1st/99th) of the
//! last K raw returns, computed with linear interpolation *before* the new
//! return joins the buffer. Until the buffer holds `min_samples` returns the
//! raw value passes through unchanged.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::error::{reserve_window, PipelineError};
use crate::domain::returns::{log_return, percentile, ReturnObservation};
use crate::strategy::params::WinsorizeParams;

/// Per-asset return tracker with trailing winsorization
#[derive(Debug, Clone)]
pub struct ReturnCalculator {
    symbol: String,
    /// Last accepted close (the anchor for the next return)
    last_close: Option<f64>,
    /// Trailing raw returns
    raw_returns: VecDeque<f64>,
    capacity: usize,
    params: WinsorizeParams,
}

impl ReturnCalculator {
    /// Create a calculator keeping the last `capacity` raw returns
    pub fn new(
        symbol: impl Into<String>,
        capacity: usize,
        params: WinsorizeParams,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            symbol: symbol.into(),
            last_close: None,
            raw_returns: reserve_window("winsorize buffer", capacity)?,
            capacity,
            params,
        })
    }

    /// Feed a close price.
    ///
    /// The first close after construction (or after [`reset_anchor`]) only
    /// primes the anchor and yields `None`. A rejected price leaves the
    /// calculator untouched.
    ///
    /// [`reset_anchor`]: ReturnCalculator::reset_anchor
    pub fn observe(
        &mut self,
        close: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<ReturnObservation>, PipelineError> {
        let Some(previous) = self.last_close else {
            if !close.is_finite() || close <= 0.0 {
                return Err(PipelineError::InvalidPrice {
                    symbol: self.symbol.clone(),
                    price: close,
                });
            }
            self.last_close = Some(close);
            return Ok(None);
        };

        let raw = log_return(&self.symbol, previous, close)?;
        let (clipped, was_clipped) = self.clip(raw);

        self.raw_returns.push_back(raw);
        while self.raw_returns.len() > self.capacity {
            self.raw_returns.pop_front();
        }
        self.last_close = Some(close);

        Ok(Some(ReturnObservation {
            timestamp,
            raw_log_return: raw,
            clipped_log_return: clipped,
            was_clipped,
        }))
    }

    /// Clip a raw return to the current percentile bounds
    pub fn clip(&self, raw: f64) -> (f64, bool) {
        match self.bounds() {
            Some((lo, hi)) => {
                let clipped = raw.clamp(lo, hi);
                (clipped, clipped != raw)
            }
            None => (raw, false),
        }
    }

    /// Current [lower, upper] clip bounds, `None` while the buffer is too small
    pub fn bounds(&self) -> Option<(f64, f64)> {
        if self.raw_returns.len() < self.params.min_samples.max(1) {
            return None;
        }
        let mut sorted: Vec<f64> = self.raw_returns.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let lo = percentile(&sorted, self.params.lower_percentile)?;
        let hi = percentile(&sorted, self.params.upper_percentile)?;
        Some((lo, hi))
    }

    /// Forget the anchor so the next close re-primes instead of spanning a gap
    pub fn reset_anchor(&mut self) {
        self.last_close = None;
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last_close
    }

    pub fn buffer_len(&self) -> usize {
        self.raw_returns.len()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}
