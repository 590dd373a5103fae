//! Signal State Machine
//!
//! Threshold / hysteresis / cooldown logic over the cumulative residual:
//!
//! - Idle: pct >= +threshold arms positive (emit), pct <= -threshold arms
//!   negative (emit)
//! - Armed: stays armed inside the hysteresis band; leaving it starts a
//!   cooldown without emitting. An opposite-side crossing starts a new
//!   excursion immediately (emit).
//! - Cooldown: evaluations are ignored until `cooldown_until`, after which
//!   the same tick is re-evaluated as Idle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::signal::Direction;
use crate::strategy::params::SignalParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SignalState {
    Idle,
    ArmedPositive,
    ArmedNegative,
    Cooldown { until: DateTime<Utc> },
}

impl SignalState {
    pub fn is_armed(&self) -> bool {
        matches!(self, SignalState::ArmedPositive | SignalState::ArmedNegative)
    }

    pub fn armed(direction: Direction) -> Self {
        match direction {
            Direction::Positive => SignalState::ArmedPositive,
            Direction::Negative => SignalState::ArmedNegative,
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalState::Idle => write!(f, "IDLE"),
            SignalState::ArmedPositive => write!(f, "ARMED_POSITIVE"),
            SignalState::ArmedNegative => write!(f, "ARMED_NEGATIVE"),
            SignalState::Cooldown { .. } => write!(f, "COOLDOWN"),
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalEvaluation {
    pub state_before: SignalState,
    pub state_after: SignalState,
    pub transitioned: bool,
    /// Set when this tick starts a new excursion
    pub event: Option<Direction>,
    /// The tick was swallowed by an unexpired cooldown
    pub cooldown_active: bool,
}

/// One instance per monitored pair
#[derive(Debug, Clone)]
pub struct SignalStateMachine {
    params: SignalParams,
    state: SignalState,
    last_transition_time: Option<DateTime<Utc>>,
}

impl SignalStateMachine {
    pub fn new(params: SignalParams) -> Self {
        Self {
            params,
            state: SignalState::Idle,
            last_transition_time: None,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn last_transition_time(&self) -> Option<DateTime<Utc>> {
        self.last_transition_time
    }

    /// Cooldown deadline, if cooling down
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SignalState::Cooldown { until } => Some(until),
            _ => None,
        }
    }

    /// Evaluate the current cumulative residual (fraction, 0.01 == 1%)
    pub fn evaluate(&mut self, pct: f64, now: DateTime<Utc>) -> SignalEvaluation {
        let state_before = self.state;
        let mut event = None;
        let mut cooldown_active = false;

        let next = match self.state {
            SignalState::Cooldown { until } if now < until => {
                cooldown_active = true;
                self.state
            }
            SignalState::Cooldown { .. } | SignalState::Idle => {
                let (next, fired) = self.from_idle(pct);
                event = fired;
                next
            }
            SignalState::ArmedPositive => {
                if pct <= -self.params.threshold {
                    event = Some(Direction::Negative);
                    SignalState::ArmedNegative
                } else if pct >= self.params.threshold - self.params.hysteresis {
                    SignalState::ArmedPositive
                } else {
                    SignalState::Cooldown { until: self.cooldown_end(now) }
                }
            }
            SignalState::ArmedNegative => {
                if pct >= self.params.threshold {
                    event = Some(Direction::Positive);
                    SignalState::ArmedPositive
                } else if pct <= -self.params.threshold + self.params.hysteresis {
                    SignalState::ArmedNegative
                } else {
                    SignalState::Cooldown { until: self.cooldown_end(now) }
                }
            }
        };

        let transitioned = next != state_before;
        if transitioned {
            self.last_transition_time = Some(now);
        }
        self.state = next;

        SignalEvaluation {
            state_before,
            state_after: next,
            transitioned,
            event,
            cooldown_active,
        }
    }

    fn cooldown_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.params.cooldown())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn from_idle(&self, pct: f64) -> (SignalState, Option<Direction>) {
        if pct >= self.params.threshold {
            (SignalState::ArmedPositive, Some(Direction::Positive))
        } else if pct <= -self.params.threshold {
            (SignalState::ArmedNegative, Some(Direction::Negative))
        } else {
            (SignalState::Idle, None)
        }
    }

    pub fn reset(&mut self) {
        self.state = SignalState::Idle;
        self.last_transition_time = None;
    }
}
