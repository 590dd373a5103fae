//! Strategy Layer - Online residual analytics for a correlated pair
//!
//! Bar-by-bar statistics, all O(1) per update over bounded windows:
//! - Log-returns with trailing percentile winsorization
//! - Rolling OLS of the dependent leg on the explanatory leg, EWMA-smoothed slope
//! - Trailing sum of regression residuals
//! - Threshold / hysteresis / cooldown state machine over the residual sum

pub mod params;
pub mod moments;
pub mod return_calculator;
pub mod regression;
pub mod residual;
pub mod signal_machine;

pub use params::{
    PairParams, ParamsError, PipelineConfig, RegressionParams, ResidualParams, RuntimeParams,
    SignalParams, WinsorizeParams,
};
pub use moments::{Moments, SlidingMoments};
pub use return_calculator::ReturnCalculator;
pub use regression::{RegressionState, RollingRegression};
pub use residual::{ResidualAccumulator, ResidualSnapshot};
pub use signal_machine::{SignalEvaluation, SignalState, SignalStateMachine};
