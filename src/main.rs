//! ethid - Idiosyncratic move monitor
//!
//! Replays recorded klines or a synthetic stream through the residual
//! pipeline and forwards signals to the configured sinks.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use ethid::adapters::cli::{CheckConfigCmd, CliApp, Command, ReplayCmd, RunArgs, SimulateCmd};
use ethid::adapters::market_data::{JumpSpec, ReplayFeed, SyntheticConfig, SyntheticFeed};
use ethid::adapters::sinks::{JsonlSink, LogSink};
use ethid::application::{EmissionDispatcher, PairSupervisor};
use ethid::config::{load_config, load_or_default, Config, LoggingSection};
use ethid::ports::{BarFeed, EmissionSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let forced_level = app.level_override();

    match app.command {
        Command::Replay(cmd) => replay_command(cmd, forced_level).await,
        Command::Simulate(cmd) => simulate_command(cmd, forced_level).await,
        Command::CheckConfig(cmd) => check_config_command(cmd, forced_level),
    }
}

fn init_logging(logging: &LoggingSection, forced_level: Option<&str>) -> Result<()> {
    // RUST_LOG wins over flags and config
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(forced_level.unwrap_or(&logging.level))
            .context("Invalid log level")?,
    };

    let result = if logging.json {
        fmt().json().with_env_filter(filter).try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    result.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

fn load(run: &RunArgs) -> Result<Config> {
    let path = run.config.as_deref().map(expand);
    load_or_default(path.as_ref()).context("Failed to load configuration")
}

async fn replay_command(cmd: ReplayCmd, forced_level: Option<&str>) -> Result<()> {
    let config = load(&cmd.run)?;
    init_logging(&config.logging, forced_level)?;

    let input = expand(&cmd.input);
    tracing::info!(input = %input.display(), "Starting replay");
    let feed = ReplayFeed::new(&input);
    run_pipeline(&config, &feed, cmd.run.output.as_ref()).await
}

async fn simulate_command(cmd: SimulateCmd, forced_level: Option<&str>) -> Result<()> {
    let config = load(&cmd.run)?;
    init_logging(&config.logging, forced_level)?;

    let jump = match (cmd.jump_at, cmd.jump_pct) {
        (Some(at), Some(pct)) => Some(JumpSpec {
            at,
            pct,
            spread: cmd.jump_bars,
        }),
        _ => None,
    };
    let synthetic = SyntheticConfig {
        explanatory_symbol: config.pair.explanatory.clone(),
        dependent_symbol: config.pair.dependent.clone(),
        bars: cmd.bars,
        seed: cmd.seed,
        beta: cmd.beta,
        jump,
        ..Default::default()
    };
    tracing::info!(
        bars = synthetic.bars,
        seed = synthetic.seed,
        beta = synthetic.beta,
        jump = ?synthetic.jump,
        "Starting simulation"
    );
    let feed = SyntheticFeed::new(synthetic);
    run_pipeline(&config, &feed, cmd.run.output.as_ref()).await
}

fn check_config_command(cmd: CheckConfigCmd, forced_level: Option<&str>) -> Result<()> {
    let config = load_config(expand(&cmd.config)).context("Configuration is invalid")?;
    init_logging(&config.logging, forced_level)?;

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);
    for pipeline in config.pipeline_configs() {
        println!("# pair {} OK", pipeline.pair.label());
    }
    Ok(())
}

async fn run_pipeline(
    config: &Config,
    feed: &dyn BarFeed,
    output: Option<&PathBuf>,
) -> Result<()> {
    let mut sinks: Vec<Arc<dyn EmissionSink>> = Vec::new();
    if config.sinks.log {
        sinks.push(Arc::new(LogSink::new()));
    }
    let jsonl_path = output
        .map(|p| expand(p))
        .or_else(|| config.sinks.jsonl_path.as_deref().map(|p| expand(Path::new(p))));
    if let Some(path) = jsonl_path {
        let sink = JsonlSink::open(&path, config.sinks.jsonl_metrics)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        tracing::info!(path = %path.display(), "Writing emissions");
        sinks.push(Arc::new(sink));
    }

    let (emitter, dispatcher) = EmissionDispatcher::spawn(sinks, config.pipeline.emission_buffer);
    let supervisor = PairSupervisor::new(config.pipeline_configs(), emitter)
        .context("Failed to allocate pipeline buffers")?;

    // Setup Ctrl+C handler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        shutdown_tx.send(true).ok();
    });

    let bars = feed.subscribe().await.context("Failed to subscribe to bar feed")?;
    let reports = supervisor.run(bars, shutdown_rx).await?;
    let dispatch = dispatcher.join().await;

    for report in &reports {
        println!(
            "{}: pairs={} signals={} missing_legs={} rejected={}",
            report.pair,
            report.stats.pairs_processed,
            report.stats.signals,
            report.stats.missing_legs,
            report.stats.bars_rejected + report.stats.pairs_rejected,
        );
    }
    println!(
        "emissions: delivered={} dropped={} sink_failures={}",
        dispatch.delivered, dispatch.dropped, dispatch.sink_failures
    );
    Ok(())
}
