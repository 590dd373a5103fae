//! Pipeline Orchestrator
//!
//! Drives one pair's pipeline from a bar channel. The loop races three
//! sources in `tokio::select!`: the shutdown signal, the next bar, and the
//! deadline of the oldest parked leg. Each bar is processed to completion
//! before the next is taken; emissions go through the non-blocking
//! [`EmissionHandle`].

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use crate::application::dispatcher::EmissionHandle;
use crate::application::pairing::{BarPairer, PairingEvent};
use crate::application::pipeline::{BarOutcome, PairPipeline};
use crate::domain::bar::Bar;
use crate::domain::error::PipelineError;
use crate::strategy::params::PipelineConfig;

/// Counters for one pair's run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub bars_received: u64,
    pub bars_rejected: u64,
    pub pairs_processed: u64,
    pub pairs_rejected: u64,
    pub missing_legs: u64,
    pub signals: u64,
    pub emissions_dropped: u64,
}

pub struct PipelineOrchestrator {
    pipeline: PairPipeline,
    pairer: BarPairer,
    emitter: EmissionHandle,
    emit_metrics: bool,
    stats: RunStats,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, emitter: EmissionHandle) -> Result<Self, PipelineError> {
        let pairer = BarPairer::new(
            &config.pair.explanatory_symbol,
            &config.pair.dependent_symbol,
            config.runtime.pairing_timeout(),
        );
        let emit_metrics = config.runtime.emit_metrics;
        Ok(Self {
            pipeline: PairPipeline::new(config)?,
            pairer,
            emitter,
            emit_metrics,
            stats: RunStats::default(),
        })
    }

    pub fn label(&self) -> &str {
        self.pipeline.label()
    }

    pub fn pipeline(&self) -> &PairPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run until the bar channel closes or shutdown is signalled.
    ///
    /// Dropping the shutdown sender also stops the loop. On shutdown the bar
    /// being processed completes, but bars still queued in `bars` are
    /// dropped unprocessed; parked legs are reported as missing. Only a
    /// fatal pipeline error ends the run with `Err`.
    pub async fn run(
        mut self,
        mut bars: mpsc::Receiver<Bar>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunStats, PipelineError> {
        tracing::info!(
            pair = %self.label(),
            pairing_timeout_ms = self.pairer.timeout().as_millis() as u64,
            "Starting pipeline"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let deadline = self.pairer.next_deadline();

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!(pair = %self.label(), "Shutdown requested");
                        break;
                    }
                }
                maybe_bar = bars.recv() => match maybe_bar {
                    Some(bar) => self.on_bar(bar)?,
                    None => {
                        tracing::info!(pair = %self.label(), "Bar stream closed");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let events = self.pairer.expire(Instant::now());
                    self.apply_all(events)?;
                }
            }
        }

        let leftovers = self.pairer.drain();
        self.apply_all(leftovers)?;

        self.stats.emissions_dropped = self.emitter.dropped();
        tracing::info!(
            pair = %self.label(),
            pairs = self.stats.pairs_processed,
            signals = self.stats.signals,
            missing_legs = self.stats.missing_legs,
            rejected = self.stats.bars_rejected + self.stats.pairs_rejected,
            "Pipeline stopped"
        );
        Ok(self.stats)
    }

    /// Handle one incoming bar synchronously
    pub fn on_bar(&mut self, bar: Bar) -> Result<(), PipelineError> {
        self.stats.bars_received += 1;
        match self.pairer.offer(bar, Instant::now()) {
            Ok(events) => self.apply_all(events),
            Err(e) => {
                self.stats.bars_rejected += 1;
                tracing::warn!(pair = %self.label(), error = %e, "Bar rejected");
                Ok(())
            }
        }
    }

    fn apply_all(&mut self, events: Vec<PairingEvent>) -> Result<(), PipelineError> {
        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }

    fn apply(&mut self, event: PairingEvent) -> Result<(), PipelineError> {
        match event {
            PairingEvent::Paired {
                explanatory,
                dependent,
                ..
            } => match self.pipeline.process_pair(&explanatory, &dependent) {
                Ok(outcome) => {
                    self.stats.pairs_processed += 1;
                    self.publish(outcome);
                    Ok(())
                }
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    self.stats.pairs_rejected += 1;
                    tracing::warn!(pair = %self.label(), error = %e, "Pair rejected");
                    Ok(())
                }
            },
            PairingEvent::Missing(err) => {
                self.stats.missing_legs += 1;
                tracing::warn!(pair = %self.label(), error = %err, "Skipping pairing point");
                if let PipelineError::MissingLegTimeout { minute, .. } = err {
                    self.pipeline.skip_gap(minute);
                }
                Ok(())
            }
        }
    }

    fn publish(&mut self, outcome: BarOutcome) {
        let BarOutcome::Updated(update) = outcome else {
            return;
        };

        tracing::debug!(
            pair = %self.label(),
            ts = %update.minute,
            beta = update.regression.beta_smoothed,
            residual = update.residual.residual,
            cumulative_pct = update.residual.pct,
            frozen = update.regression.is_frozen,
            ready = update.regression.is_ready,
            "Bar processed"
        );

        if let Some(signal) = &update.signal {
            self.stats.signals += 1;
            tracing::info!(
                pair = %signal.pair,
                direction = %signal.direction,
                res_change_pct = signal.res_change_pct,
                beta = signal.beta_smoothed,
                r2 = signal.r_squared,
                "Signal fired"
            );
        }

        for emission in update.emissions(self.emit_metrics) {
            self.emitter.emit(emission);
        }
    }
}
