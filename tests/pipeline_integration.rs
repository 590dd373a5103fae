//! End-to-end tests over the public API: feeds, supervisor, dispatcher, sinks.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use regex::Regex;
use tokio::sync::{mpsc, watch};
use tokio_test::{assert_err, assert_ok};

use ethid::adapters::market_data::{JumpSpec, ReplayFeed, SyntheticConfig, SyntheticFeed};
use ethid::adapters::sinks::JsonlSink;
use ethid::application::{BarOutcome, EmissionDispatcher, PairPipeline, PairSupervisor, PipelineOrchestrator};
use ethid::domain::bar::Bar;
use ethid::domain::error::PipelineError;
use ethid::domain::signal::{Direction, Emission, SignalEvent};
use ethid::ports::market_data::BarFeed;
use ethid::ports::sink::{EmissionSink, SinkError};
use ethid::strategy::params::PipelineConfig;

/// Keeps everything it is handed
#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<Emission>>,
    flushed: Mutex<bool>,
}

impl RecordingSink {
    fn signals(&self) -> Vec<SignalEvent> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Emission::Signal(s) => Some(s.clone()),
                Emission::Metrics(_) => None,
            })
            .collect()
    }

    fn metrics_count(&self) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Emission::Metrics(_)))
            .count()
    }
}

#[async_trait]
impl EmissionSink for RecordingSink {
    async fn publish(&self, emission: &Emission) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(emission.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        *self.flushed.lock().unwrap() = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn synthetic(jump: Option<JumpSpec>) -> SyntheticFeed {
    SyntheticFeed::new(SyntheticConfig {
        bars: 400,
        seed: 7,
        jump,
        ..Default::default()
    })
}

fn monitor_config() -> PipelineConfig {
    PipelineConfig::default().with_residual_window(30)
}

fn bar(symbol: &str, minute: i64, price: f64) -> Bar {
    let open = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
    Bar::new(symbol, open, open + Duration::milliseconds(59_999), price)
}

async fn run_supervised(
    feed: &dyn BarFeed,
    config: PipelineConfig,
    sink: Arc<RecordingSink>,
) -> ethid::application::RunStats {
    let (handle, dispatcher) = EmissionDispatcher::spawn(vec![sink], 1_024);
    let supervisor = PairSupervisor::new(vec![config], handle).unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let bars = feed.subscribe().await.unwrap();
    let mut reports = supervisor.run(bars, shutdown_rx).await.unwrap();
    let stats = dispatcher.join().await;
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.sink_failures, 0);
    reports.remove(0).stats
}

#[tokio::test]
async fn test_idiosyncratic_jump_fires_positive_signal() {
    let jump = JumpSpec {
        at: 300,
        pct: 0.03,
        spread: 15,
    };
    let feed = synthetic(Some(jump));
    let sink = Arc::new(RecordingSink::default());

    let stats = run_supervised(&feed, monitor_config(), sink.clone()).await;
    assert_eq!(stats.bars_received, 800);
    assert_eq!(stats.pairs_processed, 400);
    assert_eq!(stats.missing_legs, 0);

    let signals = sink.signals();
    assert!(!signals.is_empty(), "jump should raise an alert");
    assert!(signals.iter().all(|s| s.direction == Direction::Positive));

    let first = &signals[0];
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    // bar i closes at minute i + 1
    let fired_at = (first.timestamp - start).num_minutes();
    assert!((301..=316).contains(&fired_at), "fired at minute {}", fired_at);
    assert!(first.res_change_pct >= 1.0);
    assert_eq!(first.event, "ETH_OWN_MOVE");
    assert_eq!(first.window_min, 30);
    assert!(!first.cooldown_active);
    assert!((first.beta_smoothed - 0.8).abs() < 0.2);

    // one metrics record for every pair after the priming bar
    assert_eq!(sink.metrics_count(), 399);
    assert!(*sink.flushed.lock().unwrap());
}

#[tokio::test]
async fn test_co_movement_alone_stays_quiet() {
    let feed = synthetic(None);
    let sink = Arc::new(RecordingSink::default());

    let stats = run_supervised(&feed, monitor_config(), sink.clone()).await;
    assert_eq!(stats.signals, 0);
    assert!(sink.signals().is_empty());
}

#[tokio::test]
async fn test_replayed_file_writes_signal_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bars.jsonl");
    let output = dir.path().join("out").join("signals.jsonl");

    let bars = synthetic(Some(JumpSpec {
        at: 300,
        pct: 0.03,
        spread: 15,
    }))
    .generate();
    let mut body = String::new();
    for bar in &bars {
        body.push_str(&serde_json::to_string(bar).unwrap());
        body.push('\n');
    }
    body.push_str("not json at all\n");
    std::fs::write(&input, body).unwrap();

    let feed = ReplayFeed::new(&input);
    let jsonl: Arc<dyn EmissionSink> = Arc::new(JsonlSink::open(&output, false).await.unwrap());
    let (handle, dispatcher) = EmissionDispatcher::spawn(vec![jsonl], 1_024);
    let supervisor = PairSupervisor::new(vec![monitor_config()], handle).unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let reports = supervisor
        .run(feed.subscribe().await.unwrap(), shutdown_rx)
        .await
        .unwrap();
    assert_eq!(reports[0].stats.pairs_processed, 400);
    dispatcher.join().await;

    let written = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert!(!lines.is_empty());

    let ts_format = Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:00Z$").unwrap();
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["kind"], "signal");
        assert_eq!(value["event"], "ETH_OWN_MOVE");
        assert!(ts_format.is_match(value["ts"].as_str().unwrap()));
        for key in ["window_min", "res_change_pct", "beta", "r2", "cooldown_active"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}

#[test]
fn test_out_of_order_pair_leaves_state_unchanged() {
    let config = PipelineConfig::default()
        .with_regression_window(20, 5)
        .with_residual_window(5);
    let mut pipeline = PairPipeline::new(config).unwrap();

    for m in 0..10 {
        let x = 60_000.0 * (1.0 + 0.001 * ((m % 3) as f64 - 1.0));
        let y = 3_000.0 * (1.0 + 0.0008 * ((m % 3) as f64 - 1.0));
        assert_ok!(pipeline.process_pair(&bar("BTCUSDT", m, x), &bar("ETHUSDT", m, y)));
    }
    let count = pipeline.regression().observation_count();
    let sum = pipeline.residual().sum().unwrap();
    let state = pipeline.signal_machine().state();

    let err = assert_err!(pipeline.process_pair(&bar("BTCUSDT", 4, 61_000.0), &bar("ETHUSDT", 4, 3_100.0)));
    assert!(matches!(err, PipelineError::OutOfOrder { .. }));

    assert_eq!(pipeline.regression().observation_count(), count);
    assert_eq!(pipeline.residual().sum().unwrap(), sum);
    assert_eq!(pipeline.signal_machine().state(), state);
}

#[test]
fn test_no_evaluation_before_warmup() {
    let config = PipelineConfig::default()
        .with_regression_window(40, 20)
        .with_residual_window(5);
    let mut pipeline = PairPipeline::new(config).unwrap();

    let bars = synthetic(None).generate();
    let mut evaluated_from = None;
    for (i, pair) in bars.chunks(2).take(60).enumerate() {
        let outcome = pipeline.process_pair(&pair[0], &pair[1]).unwrap();
        if let BarOutcome::Updated(update) = outcome {
            let observations = update.regression.observation_count;
            if update.evaluation.is_some() {
                assert!(observations >= 20);
                evaluated_from.get_or_insert(i);
            } else {
                assert!(observations < 20);
            }
        }
    }
    // first pair only primes, so the 20th observation comes with pair 20
    assert_eq!(evaluated_from, Some(20));
}

#[tokio::test(start_paused = true)]
async fn test_missing_leg_skips_pairing_point() {
    let sink = Arc::new(RecordingSink::default());
    let (handle, dispatcher) = EmissionDispatcher::spawn(vec![sink.clone()], 64);
    let config = PipelineConfig::default()
        .with_regression_window(20, 10)
        .with_residual_window(5);
    let orchestrator = PipelineOrchestrator::new(config, handle).unwrap();

    let (tx, rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(orchestrator.run(rx, shutdown_rx));

    tx.send(bar("BTCUSDT", 0, 60_000.0)).await.unwrap();
    tx.send(bar("ETHUSDT", 0, 3_000.0)).await.unwrap();
    // ETH minute 1 never arrives
    tx.send(bar("BTCUSDT", 1, 60_010.0)).await.unwrap();
    tokio::time::sleep(StdDuration::from_secs(6)).await;

    tx.send(bar("BTCUSDT", 2, 60_020.0)).await.unwrap();
    tx.send(bar("ETHUSDT", 2, 3_001.0)).await.unwrap();
    tx.send(bar("BTCUSDT", 3, 60_030.0)).await.unwrap();
    tx.send(bar("ETHUSDT", 3, 3_002.0)).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(10)).await;

    shutdown_tx.send(true).unwrap();
    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.missing_legs, 1);
    assert_eq!(stats.pairs_processed, 3);
    dispatcher.join().await;

    // minute 2 re-primes after the gap, so only minute 3 yields metrics
    assert_eq!(sink.metrics_count(), 1);
}
