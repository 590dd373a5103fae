//! CLI Commands
//!
//! Argument definitions for the `ethid` binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ethid - idiosyncratic move monitor for a correlated asset pair
#[derive(Parser, Debug)]
#[command(
    name = "ethid",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Detects idiosyncratic moves of one asset relative to another",
    long_about = "ethid regresses per-minute ETH returns on BTC returns over a rolling window, \
                  accumulates the unexplained residual and raises an alert when its trailing \
                  cumulative move crosses a threshold."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

impl CliApp {
    /// Log level forced by flags, if any
    pub fn level_override(&self) -> Option<&'static str> {
        if self.debug {
            Some("debug")
        } else if self.verbose {
            Some("info")
        } else {
            None
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded klines or bars through the pipeline
    Replay(ReplayCmd),

    /// Run the pipeline on a synthetic correlated stream
    Simulate(SimulateCmd),

    /// Load, validate and print the effective configuration
    CheckConfig(CheckConfigCmd),
}

/// Options shared by commands that run the pipeline
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append emissions to this JSON-lines file (overrides sinks.jsonl_path)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Replay a recorded stream
#[derive(Parser, Debug)]
pub struct ReplayCmd {
    #[command(flatten)]
    pub run: RunArgs,

    /// Newline-delimited kline payloads or bar records
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,
}

/// Synthetic run
#[derive(Parser, Debug)]
pub struct SimulateCmd {
    #[command(flatten)]
    pub run: RunArgs,

    /// Number of minutes to generate
    #[arg(long, value_name = "N", default_value = "600")]
    pub bars: usize,

    /// RNG seed
    #[arg(long, value_name = "SEED", default_value = "42")]
    pub seed: u64,

    /// True slope of the dependent leg on the explanatory leg
    #[arg(long, value_name = "BETA", default_value = "0.8")]
    pub beta: f64,

    /// Minute index at which to inject an idiosyncratic jump
    #[arg(long, value_name = "K", requires = "jump_pct")]
    pub jump_at: Option<usize>,

    /// Size of the injected jump as a fraction (0.02 = +2%)
    #[arg(long, value_name = "P", allow_hyphen_values = true, requires = "jump_at")]
    pub jump_pct: Option<f64>,

    /// Spread the jump over this many consecutive minutes
    #[arg(long, value_name = "N", default_value = "1")]
    pub jump_bars: usize,
}

/// Validate a configuration file
#[derive(Parser, Debug)]
pub struct CheckConfigCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,
}
