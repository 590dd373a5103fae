//! Pair Supervisor
//!
//! Runs one [`PipelineOrchestrator`] task per configured pair and routes the
//! shared bar stream by symbol. A symbol can feed several pairs (e.g. BTC
//! explaining both ETH and SOL); each pair gets its own copy. Pairs share no
//! mutable state.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::application::dispatcher::EmissionHandle;
use crate::application::orchestrator::{PipelineOrchestrator, RunStats};
use crate::domain::bar::Bar;
use crate::domain::error::PipelineError;
use crate::strategy::params::PipelineConfig;

const PAIR_CHANNEL_CAPACITY: usize = 256;

/// Final report for one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReport {
    pub pair: String,
    pub stats: RunStats,
}

pub struct PairSupervisor {
    orchestrators: Vec<PipelineOrchestrator>,
}

impl PairSupervisor {
    /// Build every pair's pipeline up front so allocation failures surface
    /// before any bar is consumed.
    pub fn new(configs: Vec<PipelineConfig>, emitter: EmissionHandle) -> Result<Self, PipelineError> {
        let orchestrators = configs
            .into_iter()
            .map(|config| PipelineOrchestrator::new(config, emitter.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { orchestrators })
    }

    pub fn pairs(&self) -> Vec<String> {
        self.orchestrators.iter().map(|o| o.label().to_string()).collect()
    }

    /// Route bars until the feed ends or shutdown, then wait for every pair
    pub async fn run(
        self,
        mut bars: mpsc::Receiver<Bar>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<PairReport>, PipelineError> {
        let mut routes: HashMap<String, Vec<mpsc::Sender<Bar>>> = HashMap::new();
        let mut tasks: Vec<(String, JoinHandle<Result<RunStats, PipelineError>>)> = Vec::new();

        for orchestrator in self.orchestrators {
            let (tx, rx) = mpsc::channel(PAIR_CHANNEL_CAPACITY);
            let config = orchestrator.pipeline().config();
            for symbol in [&config.pair.explanatory_symbol, &config.pair.dependent_symbol] {
                routes
                    .entry(symbol.trim().to_ascii_uppercase())
                    .or_default()
                    .push(tx.clone());
            }
            let label = orchestrator.label().to_string();
            let task = tokio::spawn(orchestrator.run(rx, shutdown.clone()));
            tasks.push((label, task));
        }

        tracing::info!(pairs = tasks.len(), symbols = routes.len(), "Supervisor started");

        let mut unrouted = 0u64;
        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe_bar = bars.recv() => {
                    let Some(bar) = maybe_bar else { break };
                    match routes.get(&bar.symbol) {
                        Some(targets) => {
                            for tx in targets {
                                // a pair task only exits on shutdown or a fatal error
                                if tx.send(bar.clone()).await.is_err() {
                                    tracing::warn!(symbol = %bar.symbol, "Pair task gone, bar not routed");
                                }
                            }
                        }
                        None => {
                            unrouted += 1;
                            tracing::debug!(symbol = %bar.symbol, "No pair for symbol");
                        }
                    }
                }
            }
        }

        // Closing the routes lets each pair finish its in-flight bars
        drop(routes);
        if unrouted > 0 {
            tracing::warn!(bars = unrouted, "Bars for unconfigured symbols were ignored");
        }

        let mut reports = Vec::with_capacity(tasks.len());
        let mut fatal = None;
        for (pair, task) in tasks {
            match task.await {
                Ok(Ok(stats)) => reports.push(PairReport { pair, stats }),
                Ok(Err(e)) => {
                    tracing::error!(pair = %pair, error = %e, "Pair pipeline failed");
                    fatal.get_or_insert(e);
                }
                Err(e) => tracing::error!(pair = %pair, "Pair task panicked: {}", e),
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::EmissionDispatcher;
    use crate::strategy::params::PairParams;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(symbol: &str, minute: i64, price: f64) -> Bar {
        let open = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Bar::new(symbol, open, open + Duration::milliseconds(59_999), price)
    }

    fn pair_config(explanatory: &str, dependent: &str) -> PipelineConfig {
        let mut config = PipelineConfig::default()
            .with_regression_window(20, 10)
            .with_residual_window(5);
        config.pair = PairParams {
            explanatory_symbol: explanatory.to_string(),
            dependent_symbol: dependent.to_string(),
            ..Default::default()
        };
        config
    }

    #[tokio::test]
    async fn test_routes_shared_symbol_to_every_pair() {
        let (handle, dispatcher) = EmissionDispatcher::spawn(Vec::new(), 64);
        let supervisor = PairSupervisor::new(
            vec![
                pair_config("BTCUSDT", "ETHUSDT"),
                pair_config("BTCUSDT", "SOLUSDT"),
            ],
            handle,
        )
        .unwrap();
        assert_eq!(supervisor.pairs(), vec!["ETHUSDT/BTCUSDT", "SOLUSDT/BTCUSDT"]);

        let (tx, rx) = mpsc::channel(64);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(rx, shutdown_rx));

        for m in 0..3 {
            tx.send(bar("BTCUSDT", m, 60_000.0 + m as f64)).await.unwrap();
            tx.send(bar("ETHUSDT", m, 3_000.0 + m as f64)).await.unwrap();
            tx.send(bar("SOLUSDT", m, 150.0 + m as f64)).await.unwrap();
            tx.send(bar("XRPUSDT", m, 0.5)).await.unwrap();
        }
        drop(tx);

        let reports = task.await.unwrap().unwrap();
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert_eq!(report.stats.pairs_processed, 3);
            assert_eq!(report.stats.bars_received, 6);
        }
        // 2 pairs x 2 updated bars of metrics
        assert_eq!(dispatcher.join().await.delivered, 4);
    }
}
