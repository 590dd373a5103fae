//! Rolling Regression
//!
//! Online OLS of the dependent return (y) on the explanatory return (x)
//! over the last W paired observations:
//!
//!   beta_raw = Cov(x, y) / Var(x)
//!   alpha    = mean(y) - beta_raw * mean(x)
//!   beta_sm  = lambda * beta_sm_prev + (1 - lambda) * beta_raw
//!   R²       = 1 - SSE / SST
//!
//! When the explanatory leg goes flat (Var(x) < epsilon) the slope is
//! unidentified: beta_raw is not recomputed, beta_smoothed is frozen at its
//! last value and `is_frozen` is reported instead of raising.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;
use crate::strategy::moments::{Moments, SlidingMoments};
use crate::strategy::params::RegressionParams;

/// Snapshot of the regression after an update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionState {
    /// Unsmoothed window slope (last valid value while frozen, 0 before any)
    pub beta_raw: f64,
    /// EWMA-smoothed slope (0 before the first valid estimate)
    pub beta_smoothed: f64,
    pub alpha: f64,
    pub r_squared: f64,
    /// Accepted updates since construction
    pub observation_count: u64,
    pub window_len: usize,
    pub is_frozen: bool,
    /// observation_count >= warmup
    pub is_ready: bool,
}

/// Incremental rolling OLS with EWMA slope smoothing
#[derive(Debug, Clone)]
pub struct RollingRegression {
    params: RegressionParams,
    moments: SlidingMoments,
    beta_raw: Option<f64>,
    beta_smoothed: Option<f64>,
    alpha: f64,
    r_squared: f64,
    observation_count: u64,
    is_frozen: bool,
}

impl RollingRegression {
    pub fn new(params: RegressionParams, resync_interval: usize) -> Result<Self, PipelineError> {
        Ok(Self {
            moments: SlidingMoments::new(params.window, resync_interval)?,
            params,
            beta_raw: None,
            beta_smoothed: None,
            alpha: 0.0,
            r_squared: 0.0,
            observation_count: 0,
            is_frozen: false,
        })
    }

    /// Add one paired observation and refresh the estimates
    pub fn update(&mut self, x: f64, y: f64) -> RegressionState {
        self.moments.push(x, y);
        self.observation_count += 1;

        if let Some(m) = self.moments.moments() {
            self.refit(&m);
        }
        self.snapshot()
    }

    fn refit(&mut self, m: &Moments) {
        if m.sxx < self.params.var_epsilon {
            // Degenerate explanatory variance: keep the last slope, freeze smoothing
            self.is_frozen = true;
            self.alpha = m.mean_y - self.beta_raw.unwrap_or(0.0) * m.mean_x;
            self.r_squared = 0.0;
            return;
        }

        let beta = m.sxy / m.sxx;
        self.is_frozen = false;
        self.beta_raw = Some(beta);
        self.beta_smoothed = Some(match self.beta_smoothed {
            None => beta,
            Some(prev) => self.params.ewma_lambda * prev + (1.0 - self.params.ewma_lambda) * beta,
        });
        self.alpha = m.mean_y - beta * m.mean_x;

        let sst = m.syy;
        self.r_squared = if sst < self.params.var_epsilon {
            0.0
        } else {
            let sse = (sst - beta * m.sxy).max(0.0);
            (1.0 - sse / sst).clamp(0.0, 1.0)
        };
    }

    fn snapshot(&self) -> RegressionState {
        RegressionState {
            beta_raw: self.beta_raw.unwrap_or(0.0),
            beta_smoothed: self.beta_smoothed.unwrap_or(0.0),
            alpha: self.alpha,
            r_squared: self.r_squared,
            observation_count: self.observation_count,
            window_len: self.moments.len(),
            is_frozen: self.is_frozen,
            is_ready: self.is_ready(),
        }
    }

    /// Current state; fails before the first observation
    pub fn state(&self) -> Result<RegressionState, PipelineError> {
        if self.observation_count == 0 {
            return Err(PipelineError::InsufficientData("regression has no observations"));
        }
        Ok(self.snapshot())
    }

    /// Outputs may be acted on once warmup is reached
    pub fn is_ready(&self) -> bool {
        self.observation_count >= self.params.warmup as u64
    }

    pub fn window_len(&self) -> usize {
        self.moments.len()
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    pub fn params(&self) -> &RegressionParams {
        &self.params
    }

    /// Drop all history and estimates
    pub fn reset(&mut self) {
        self.moments.clear();
        self.beta_raw = None;
        self.beta_smoothed = None;
        self.alpha = 0.0;
        self.r_squared = 0.0;
        self.observation_count = 0;
        self.is_frozen = false;
    }
}
