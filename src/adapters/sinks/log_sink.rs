use async_trait::async_trait;

use crate::domain::signal::Emission;
use crate::ports::sink::{EmissionSink, SinkError};

/// Structured-log sink: signals at info, metrics at debug
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmissionSink for LogSink {
    async fn publish(&self, emission: &Emission) -> Result<(), SinkError> {
        match emission {
            Emission::Signal(event) => {
                let record = event.to_record();
                tracing::info!(
                    ts = %record.ts,
                    event = %record.event,
                    pair = %event.pair,
                    direction = %event.direction,
                    window_min = record.window_min,
                    res_change_pct = record.res_change_pct,
                    beta = record.beta,
                    r2 = record.r2,
                    cooldown_active = record.cooldown_active,
                    "Idiosyncratic move"
                );
            }
            Emission::Metrics(m) => {
                tracing::debug!(
                    ts = %m.timestamp,
                    pair = %m.symbol_pair,
                    beta_raw = m.beta_raw,
                    beta_smoothed = m.beta_smoothed,
                    alpha = m.alpha,
                    r2 = m.r_squared,
                    residual = m.residual,
                    cumulative_pct = m.cumulative_pct,
                    "Bar metrics"
                );
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
