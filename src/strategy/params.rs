//! Pipeline Parameters
//!
//! Configuration structs for the residual monitor. Defaults reproduce the
//! reference methodology: 240m regression, 120 bars warmup, 60m residual
//! horizon, 1% threshold with a 0.2% hysteresis band and 30m cooldown.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::signal::OWN_MOVE_EVENT;

/// Main pipeline configuration for one monitored pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub pair: PairParams,
    pub regression: RegressionParams,
    pub winsorize: WinsorizeParams,
    pub residual: ResidualParams,
    pub signal: SignalParams,
    pub runtime: RuntimeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pair: PairParams::default(),
            regression: RegressionParams::default(),
            winsorize: WinsorizeParams::default(),
            residual: ResidualParams::default(),
            signal: SignalParams::default(),
            runtime: RuntimeParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Override the regression window and warmup
    pub fn with_regression_window(mut self, window: usize, warmup: usize) -> Self {
        self.regression.window = window;
        self.regression.warmup = warmup;
        self
    }

    /// Override the residual horizon
    pub fn with_residual_window(mut self, window: usize) -> Self {
        self.residual.window = window;
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.pair.validate()?;
        self.regression.validate()?;
        self.winsorize.validate()?;
        self.residual.validate()?;
        self.signal.validate()?;
        self.runtime.validate()?;
        Ok(())
    }
}

/// Which symbol explains which
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairParams {
    /// Regressor leg (x), e.g. BTCUSDT
    pub explanatory_symbol: String,
    /// Explained leg (y), e.g. ETHUSDT
    pub dependent_symbol: String,
    /// Name put on emitted events
    pub event_name: String,
}

impl Default for PairParams {
    fn default() -> Self {
        Self {
            explanatory_symbol: "BTCUSDT".to_string(),
            dependent_symbol: "ETHUSDT".to_string(),
            event_name: OWN_MOVE_EVENT.to_string(),
        }
    }
}

impl PairParams {
    /// "ETHUSDT/BTCUSDT"
    pub fn label(&self) -> String {
        format!("{}/{}", self.dependent_symbol, self.explanatory_symbol)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        let x = self.explanatory_symbol.trim();
        let y = self.dependent_symbol.trim();
        if x.is_empty() || y.is_empty() {
            return Err(ParamsError::InvalidPair("symbols cannot be empty".to_string()));
        }
        if x.eq_ignore_ascii_case(y) {
            return Err(ParamsError::InvalidPair(format!(
                "explanatory and dependent symbol are both {}",
                x
            )));
        }
        Ok(())
    }
}

/// Rolling OLS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionParams {
    /// Window length W in bars
    pub window: usize,
    /// Observations required before outputs are trusted
    pub warmup: usize,
    /// EWMA weight on the previous smoothed beta
    pub ewma_lambda: f64,
    /// Freeze threshold on the explanatory sum of squares
    pub var_epsilon: f64,
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            window: 240,
            warmup: 120,
            ewma_lambda: 0.94,
            var_epsilon: 1e-12,
        }
    }
}

impl RegressionParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.window < 2 {
            return Err(ParamsError::InvalidWindow("regression", self.window));
        }
        if self.warmup == 0 {
            return Err(ParamsError::InvalidWarmup(self.warmup));
        }
        if !(self.ewma_lambda > 0.0 && self.ewma_lambda < 1.0) {
            return Err(ParamsError::InvalidLambda(self.ewma_lambda));
        }
        if !(self.var_epsilon > 0.0) {
            return Err(ParamsError::InvalidEpsilon(self.var_epsilon));
        }
        Ok(())
    }
}

/// Outlier clipping of raw returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinsorizeParams {
    /// Lower percentile bound (0-100)
    pub lower_percentile: f64,
    /// Upper percentile bound (0-100)
    pub upper_percentile: f64,
    /// Buffer size below which returns pass through unclipped
    pub min_samples: usize,
}

impl Default for WinsorizeParams {
    fn default() -> Self {
        Self {
            lower_percentile: 1.0,
            upper_percentile: 99.0,
            min_samples: 30,
        }
    }
}

impl WinsorizeParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let (lo, hi) = (self.lower_percentile, self.upper_percentile);
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return Err(ParamsError::InvalidPercentiles(lo, hi));
        }
        Ok(())
    }
}

/// Residual horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualParams {
    /// Window length N in bars
    pub window: usize,
}

impl Default for ResidualParams {
    fn default() -> Self {
        Self { window: 60 }
    }
}

impl ResidualParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        // reported as whole minutes on every signal
        if self.window == 0 || u32::try_from(self.window).is_err() {
            return Err(ParamsError::InvalidWindow("residual", self.window));
        }
        Ok(())
    }
}

/// Threshold / hysteresis / cooldown, as fractions (0.01 == 1%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    pub threshold: f64,
    pub hysteresis: f64,
    pub cooldown_minutes: i64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            hysteresis: 0.002,
            cooldown_minutes: 30,
        }
    }
}

/// Longest accepted cooldown: one year
pub const MAX_COOLDOWN_MINUTES: i64 = 525_600;

impl SignalParams {
    /// Cooldown length, clamped to `[0, MAX_COOLDOWN_MINUTES]`
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES))
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.threshold > 0.0) || !self.threshold.is_finite() {
            return Err(ParamsError::InvalidThreshold(self.threshold));
        }
        if !(self.hysteresis >= 0.0 && self.hysteresis < self.threshold) {
            return Err(ParamsError::InvalidHysteresis(self.hysteresis, self.threshold));
        }
        if !(0..=MAX_COOLDOWN_MINUTES).contains(&self.cooldown_minutes) {
            return Err(ParamsError::InvalidCooldown(self.cooldown_minutes));
        }
        Ok(())
    }
}

/// Runtime behavior of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParams {
    /// How long to wait for the second leg of a pairing point
    pub pairing_timeout_ms: u64,
    /// Bounded emission queue capacity
    pub emission_buffer: usize,
    /// Forward per-bar metrics records to sinks
    pub emit_metrics: bool,
    /// Evictions between full re-summations of the running sums (0 = window length)
    pub resync_interval: usize,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            pairing_timeout_ms: 5_000,
            emission_buffer: 1_024,
            emit_metrics: true,
            resync_interval: 0,
        }
    }
}

impl RuntimeParams {
    pub fn pairing_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pairing_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.emission_buffer == 0 {
            return Err(ParamsError::InvalidBuffer(self.emission_buffer));
        }
        Ok(())
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid pair: {0}")]
    InvalidPair(String),
    #[error("Invalid {0} window: {1} bars")]
    InvalidWindow(&'static str, usize),
    #[error("Invalid warmup: {0} (must be >= 1)")]
    InvalidWarmup(usize),
    #[error("Invalid EWMA lambda: {0} (must be 0 < lambda < 1)")]
    InvalidLambda(f64),
    #[error("Invalid variance epsilon: {0} (must be > 0)")]
    InvalidEpsilon(f64),
    #[error("Invalid winsorize percentiles: [{0}, {1}] (need 0 <= lower < upper <= 100)")]
    InvalidPercentiles(f64, f64),
    #[error("Invalid threshold: {0} (must be > 0)")]
    InvalidThreshold(f64),
    #[error("Invalid hysteresis: {0} (must be 0 <= h < threshold {1})")]
    InvalidHysteresis(f64, f64),
    #[error("Invalid cooldown: {0} minutes (must be 0..=525600)")]
    InvalidCooldown(i64),
    #[error("Invalid emission buffer: {0} (must be > 0)")]
    InvalidBuffer(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.regression.window, 240);
        assert_eq!(config.regression.warmup, 120);
        assert_eq!(config.regression.ewma_lambda, 0.94);
        assert_eq!(config.residual.window, 60);
        assert_eq!(config.signal.threshold, 0.01);
        assert_eq!(config.signal.hysteresis, 0.002);
        assert_eq!(config.signal.cooldown(), Duration::minutes(30));
        assert_eq!(config.winsorize.lower_percentile, 1.0);
        assert_eq!(config.winsorize.upper_percentile, 99.0);
        assert_eq!(config.pair.label(), "ETHUSDT/BTCUSDT");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::default()
            .with_regression_window(30, 10)
            .with_residual_window(5);
        assert_eq!(config.regression.window, 30);
        assert_eq!(config.regression.warmup, 10);
        assert_eq!(config.residual.window, 5);
    }

    #[test]
    fn test_invalid_lambda() {
        let mut config = PipelineConfig::default();
        config.regression.ewma_lambda = 1.0;
        assert!(matches!(config.validate(), Err(ParamsError::InvalidLambda(_))));

        config.regression.ewma_lambda = 0.0;
        assert!(matches!(config.validate(), Err(ParamsError::InvalidLambda(_))));
    }

    #[test]
    fn test_invalid_windows() {
        let mut config = PipelineConfig::default();
        config.regression.window = 1;
        assert!(matches!(
            config.validate(),
            Err(ParamsError::InvalidWindow("regression", 1))
        ));

        let mut config = PipelineConfig::default();
        config.residual.window = 0;
        assert!(matches!(
            config.validate(),
            Err(ParamsError::InvalidWindow("residual", 0))
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_residual_window_fits_minutes_field() {
        let mut residual = ResidualParams::default();
        residual.window = u32::MAX as usize;
        assert!(residual.validate().is_ok());

        residual.window = u32::MAX as usize + 1;
        assert!(matches!(
            residual.validate(),
            Err(ParamsError::InvalidWindow("residual", _))
        ));
    }

    #[test]
    fn test_hysteresis_must_sit_inside_threshold() {
        let mut signal = SignalParams::default();
        signal.hysteresis = 0.01;
        assert!(matches!(
            signal.validate(),
            Err(ParamsError::InvalidHysteresis(_, _))
        ));

        signal.hysteresis = -0.001;
        assert!(signal.validate().is_err());
    }

    #[test]
    fn test_cooldown_bounds() {
        let mut signal = SignalParams::default();
        signal.cooldown_minutes = MAX_COOLDOWN_MINUTES;
        assert!(signal.validate().is_ok());

        signal.cooldown_minutes = 1_000_000_000_000;
        assert!(matches!(
            signal.validate(),
            Err(ParamsError::InvalidCooldown(1_000_000_000_000))
        ));
        // never panics even when unvalidated
        assert_eq!(signal.cooldown(), Duration::minutes(MAX_COOLDOWN_MINUTES));

        signal.cooldown_minutes = -1;
        assert!(signal.validate().is_err());
        assert_eq!(signal.cooldown(), Duration::zero());
    }

    #[test]
    fn test_winsorize_percentile_validation() {
        let mut winsorize = WinsorizeParams::default();
        assert!(winsorize.validate().is_ok());

        winsorize.lower_percentile = 99.0;
        assert!(winsorize.validate().is_err());

        winsorize.lower_percentile = -1.0;
        assert!(winsorize.validate().is_err());
    }

    #[test]
    fn test_pair_symbols_must_differ() {
        let pair = PairParams {
            explanatory_symbol: "ethusdt".to_string(),
            dependent_symbol: "ETHUSDT".to_string(),
            event_name: OWN_MOVE_EVENT.to_string(),
        };
        assert!(matches!(pair.validate(), Err(ParamsError::InvalidPair(_))));
    }
}
