//! Pair Pipeline
//!
//! Synchronous per-pair processing of one joined bar pair:
//!
//!   bar pair -> returns -> regression update -> residual -> signal evaluation
//!
//! Both legs are validated before any component is touched, so a rejected
//! pair leaves every window exactly as it was.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::PipelineError;
use crate::domain::returns::ReturnObservation;
use crate::domain::signal::{round_pct, Emission, MetricsRecord, SignalEvent};
use crate::strategy::params::PipelineConfig;
use crate::strategy::regression::{RegressionState, RollingRegression};
use crate::strategy::residual::{ResidualAccumulator, ResidualSnapshot};
use crate::strategy::return_calculator::ReturnCalculator;
use crate::strategy::signal_machine::{SignalEvaluation, SignalStateMachine};

/// Everything computed for one fully processed pair
#[derive(Debug, Clone, PartialEq)]
pub struct BarUpdate {
    pub minute: DateTime<Utc>,
    pub explanatory: ReturnObservation,
    pub dependent: ReturnObservation,
    pub regression: RegressionState,
    pub residual: ResidualSnapshot,
    pub metrics: MetricsRecord,
    /// `None` while warming up or before the residual window fills
    pub evaluation: Option<SignalEvaluation>,
    pub signal: Option<SignalEvent>,
}

impl BarUpdate {
    /// Emissions for the sinks, metrics first
    pub fn emissions(&self, include_metrics: bool) -> Vec<Emission> {
        let mut out = Vec::with_capacity(2);
        if include_metrics {
            out.push(Emission::Metrics(self.metrics.clone()));
        }
        if let Some(signal) = &self.signal {
            out.push(Emission::Signal(signal.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    /// First pair after start or after a gap: closes recorded, no returns
    Primed { minute: DateTime<Utc> },
    Updated(Box<BarUpdate>),
}

impl BarOutcome {
    pub fn signal(&self) -> Option<&SignalEvent> {
        match self {
            BarOutcome::Updated(update) => update.signal.as_ref(),
            BarOutcome::Primed { .. } => None,
        }
    }
}

/// All per-pair state, owned by a single task
#[derive(Debug)]
pub struct PairPipeline {
    config: PipelineConfig,
    label: String,
    explanatory: ReturnCalculator,
    dependent: ReturnCalculator,
    regression: RollingRegression,
    residual: ResidualAccumulator,
    signal: SignalStateMachine,
    /// Residual horizon as reported on signals
    window_min: u32,
    last_minute: Option<DateTime<Utc>>,
}

impl PairPipeline {
    /// Build every window up front; allocation failure is the only fatal error
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let window_min = u32::try_from(config.residual.window).map_err(|_| {
            PipelineError::ResourceExhausted {
                buffer: "residual window",
                requested: config.residual.window,
            }
        })?;
        let resync = config.runtime.resync_interval;
        let winsorize_capacity = config.regression.window;
        Ok(Self {
            label: config.pair.label(),
            explanatory: ReturnCalculator::new(
                config.pair.explanatory_symbol.to_ascii_uppercase(),
                winsorize_capacity,
                config.winsorize.clone(),
            )?,
            dependent: ReturnCalculator::new(
                config.pair.dependent_symbol.to_ascii_uppercase(),
                winsorize_capacity,
                config.winsorize.clone(),
            )?,
            regression: RollingRegression::new(config.regression.clone(), resync)?,
            residual: ResidualAccumulator::new(config.residual.window, resync)?,
            signal: SignalStateMachine::new(config.signal.clone()),
            window_min,
            last_minute: None,
            config,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn regression(&self) -> &RollingRegression {
        &self.regression
    }

    pub fn residual(&self) -> &ResidualAccumulator {
        &self.residual
    }

    pub fn signal_machine(&self) -> &SignalStateMachine {
        &self.signal
    }

    pub fn last_minute(&self) -> Option<DateTime<Utc>> {
        self.last_minute
    }

    fn check_leg(&self, bar: &Bar, calculator: &ReturnCalculator) -> Result<(), PipelineError> {
        if bar.symbol != calculator.symbol() {
            return Err(PipelineError::UnknownSymbol(bar.symbol.clone()));
        }
        bar.validate_price()
    }

    /// Process one joined pair. Rejections leave all state untouched.
    pub fn process_pair(
        &mut self,
        explanatory: &Bar,
        dependent: &Bar,
    ) -> Result<BarOutcome, PipelineError> {
        self.check_leg(explanatory, &self.explanatory)?;
        self.check_leg(dependent, &self.dependent)?;

        let minute = explanatory.minute();
        if let Some(last) = self.last_minute {
            if minute <= last {
                return Err(PipelineError::OutOfOrder {
                    symbol: self.label.clone(),
                    close_time: explanatory.close_time,
                    last_close_time: last,
                });
            }
        }

        let ret_x = self.explanatory.observe(explanatory.close_price, minute)?;
        let ret_y = self.dependent.observe(dependent.close_price, minute)?;
        self.last_minute = Some(minute);

        let (Some(ret_x), Some(ret_y)) = (ret_x, ret_y) else {
            return Ok(BarOutcome::Primed { minute });
        };

        let x = ret_x.clipped_log_return;
        let y = ret_y.clipped_log_return;
        let regression = self.regression.update(x, y);
        let residual = self.residual.push(y, &regression, x, minute);

        let metrics = MetricsRecord {
            timestamp: minute,
            symbol_pair: self.label.clone(),
            beta_raw: regression.beta_raw,
            beta_smoothed: regression.beta_smoothed,
            alpha: regression.alpha,
            r_squared: regression.r_squared,
            residual: residual.residual,
            cumulative_pct: residual.pct,
        };

        let (evaluation, signal) = if regression.is_ready && residual.is_full {
            let evaluation = self.signal.evaluate(residual.pct, minute);
            let signal = evaluation.event.map(|direction| SignalEvent {
                timestamp: minute,
                event: self.config.pair.event_name.clone(),
                pair: self.label.clone(),
                direction,
                window_min: self.window_min,
                res_change_pct: round_pct(residual.pct),
                beta_smoothed: regression.beta_smoothed,
                r_squared: regression.r_squared,
                cooldown_active: evaluation.cooldown_active,
            });
            (Some(evaluation), signal)
        } else {
            (None, None)
        };

        Ok(BarOutcome::Updated(Box::new(BarUpdate {
            minute,
            explanatory: ret_x,
            dependent: ret_y,
            regression,
            residual,
            metrics,
            evaluation,
            signal,
        })))
    }

    /// A pairing point was skipped: the next pair re-primes both closes so
    /// no return spans the gap.
    pub fn skip_gap(&mut self, minute: DateTime<Utc>) {
        self.explanatory.reset_anchor();
        self.dependent.reset_anchor();
        if self.last_minute.map_or(true, |last| minute > last) {
            self.last_minute = Some(minute);
        }
    }
}
