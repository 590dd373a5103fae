//! Return Math
//!
//! Pure helpers shared by the analytics layer: log-returns, linear
//! interpolation percentiles and the log-sum to percentage conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// One asset's return for one pairing point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub timestamp: DateTime<Utc>,
    pub raw_log_return: f64,
    pub clipped_log_return: f64,
    pub was_clipped: bool,
}

/// ln(current / previous). Both prices must be finite and positive.
pub fn log_return(symbol: &str, previous: f64, current: f64) -> Result<f64, PipelineError> {
    for price in [previous, current] {
        if !price.is_finite() || price <= 0.0 {
            return Err(PipelineError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
    }
    Ok((current / previous).ln())
}

/// Percentile of an ascending-sorted slice, `p` in [0, 100].
///
/// Linear interpolation between closest ranks: rank = p/100 * (n - 1).
/// Returns `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Convert a summed log-return into a simple fractional change.
/// 0.01 means +1%.
pub fn cumulative_pct(log_sum: f64) -> f64 {
    log_sum.exp() - 1.0
}
