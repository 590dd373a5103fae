//! Residual Accumulator
//!
//! Per-bar regression residual
//!
//!   epsilon = r_dep - (alpha + beta_smoothed * r_exp)
//!
//! and its trailing sum over the last N bars. The sum is maintained
//! incrementally and re-derived from the window contents periodically.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{reserve_window, PipelineError};
use crate::domain::returns::cumulative_pct;
use crate::strategy::regression::RegressionState;

/// Result of one push
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualSnapshot {
    pub timestamp: DateTime<Utc>,
    /// This bar's residual log-return
    pub residual: f64,
    /// Cumulative residual over the window (Delta_res)
    pub sum: f64,
    /// exp(sum) - 1
    pub pct: f64,
    pub len: usize,
    /// Only a full window is meaningful for signal evaluation
    pub is_full: bool,
}

#[derive(Debug, Clone)]
pub struct ResidualAccumulator {
    window: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    evictions_since_resync: usize,
    resync_interval: usize,
    has_data: bool,
}

impl ResidualAccumulator {
    pub fn new(capacity: usize, resync_interval: usize) -> Result<Self, PipelineError> {
        Ok(Self {
            window: reserve_window("residual window", capacity)?,
            capacity,
            sum: 0.0,
            evictions_since_resync: 0,
            resync_interval: if resync_interval == 0 { capacity } else { resync_interval },
            has_data: false,
        })
    }

    /// Residual of the dependent return against the smoothed fit
    pub fn residual(return_dep: f64, state: &RegressionState, return_exp: f64) -> f64 {
        return_dep - (state.alpha + state.beta_smoothed * return_exp)
    }

    pub fn push(
        &mut self,
        return_dep: f64,
        state: &RegressionState,
        return_exp: f64,
        timestamp: DateTime<Utc>,
    ) -> ResidualSnapshot {
        let residual = Self::residual(return_dep, state, return_exp);

        if self.window.len() == self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
                self.evictions_since_resync += 1;
            }
        }
        self.window.push_back(residual);
        self.sum += residual;
        self.has_data = true;

        if self.evictions_since_resync >= self.resync_interval {
            self.resync();
        }

        ResidualSnapshot {
            timestamp,
            residual,
            sum: self.sum,
            pct: cumulative_pct(self.sum),
            len: self.window.len(),
            is_full: self.is_full(),
        }
    }

    /// Recompute the running sum from the window
    pub fn resync(&mut self) {
        self.sum = self.window.iter().sum();
        self.evictions_since_resync = 0;
    }

    pub fn sum(&self) -> Result<f64, PipelineError> {
        if !self.has_data {
            return Err(PipelineError::InsufficientData("no residuals accumulated"));
        }
        Ok(self.sum)
    }

    pub fn pct(&self) -> Result<f64, PipelineError> {
        self.sum().map(cumulative_pct)
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.evictions_since_resync = 0;
        self.has_data = false;
    }
}
