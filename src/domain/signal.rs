use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default event name for the dependent leg's own move
pub const OWN_MOVE_EVENT: &str = "ETH_OWN_MOVE";

/// Direction of an idiosyncratic excursion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Positive => write!(f, "positive"),
            Direction::Negative => write!(f, "negative"),
        }
    }
}

/// An emitted alert with the fit context it fired under
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub pair: String,
    pub direction: Direction,
    /// Residual window length in minutes
    pub window_min: u32,
    /// Cumulative residual move in percent, rounded to 2 decimals
    pub res_change_pct: f64,
    pub beta_smoothed: f64,
    pub r_squared: f64,
    pub cooldown_active: bool,
}

impl SignalEvent {
    /// Wire form handed to sinks
    pub fn to_record(&self) -> SignalRecord {
        SignalRecord {
            ts: self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event: self.event.clone(),
            window_min: self.window_min,
            res_change_pct: self.res_change_pct,
            beta: self.beta_smoothed,
            r2: self.r_squared,
            cooldown_active: self.cooldown_active,
        }
    }
}

/// Serialized signal payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub ts: String,
    pub event: String,
    pub window_min: u32,
    pub res_change_pct: f64,
    pub beta: f64,
    pub r2: f64,
    pub cooldown_active: bool,
}

/// Per-bar fit diagnostics for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol_pair: String,
    pub beta_raw: f64,
    pub beta_smoothed: f64,
    pub alpha: f64,
    pub r_squared: f64,
    pub residual: f64,
    /// Fraction, 0.01 == +1%
    pub cumulative_pct: f64,
}

/// Everything the pipeline hands to its sinks
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    Signal(SignalEvent),
    Metrics(MetricsRecord),
}

impl Emission {
    pub fn kind(&self) -> &'static str {
        match self {
            Emission::Signal(_) => "signal",
            Emission::Metrics(_) => "metrics",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Emission::Signal(event) => event.timestamp,
            Emission::Metrics(record) => record.timestamp,
        }
    }
}

/// Fraction to percent with two decimals (0.01234 -> 1.23)
pub fn round_pct(fraction: f64) -> f64 {
    (fraction * 100.0 * 100.0).round() / 100.0
}
