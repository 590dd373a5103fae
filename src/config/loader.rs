//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Every section is optional and falls back to the methodology
//! defaults; environment variables override file values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::signal::OWN_MOVE_EVENT;
use crate::strategy::params::{
    PairParams, PipelineConfig, RegressionParams, ResidualParams, RuntimeParams, SignalParams,
    WinsorizeParams,
};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pair: PairSection,
    pub regression: RegressionSection,
    pub winsorize: WinsorizeSection,
    pub residual: ResidualSection,
    pub signal: SignalSection,
    pub pipeline: PipelineSection,
    pub sinks: SinksSection,
    pub logging: LoggingSection,
    /// Further pairs sharing every other setting with the primary pair
    pub extra_pairs: Vec<PairSection>,
}

/// Monitored pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSection {
    /// Regressor leg (x)
    pub explanatory: String,
    /// Explained leg (y)
    pub dependent: String,
    /// Event name put on emitted signals
    pub event_name: String,
}

impl Default for PairSection {
    fn default() -> Self {
        Self {
            explanatory: "BTCUSDT".to_string(),
            dependent: "ETHUSDT".to_string(),
            event_name: OWN_MOVE_EVENT.to_string(),
        }
    }
}

/// Rolling OLS section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionSection {
    /// Regression window in minutes
    pub window: usize,
    /// Bars required before signals may fire
    pub warmup: usize,
    /// EWMA weight on the previous smoothed beta
    pub ewma_lambda: f64,
    /// Freeze threshold on the explanatory variance
    pub var_epsilon: f64,
}

impl Default for RegressionSection {
    fn default() -> Self {
        let p = RegressionParams::default();
        Self {
            window: p.window,
            warmup: p.warmup,
            ewma_lambda: p.ewma_lambda,
            var_epsilon: p.var_epsilon,
        }
    }
}

/// Outlier clipping section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinsorizeSection {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub min_samples: usize,
}

impl Default for WinsorizeSection {
    fn default() -> Self {
        let p = WinsorizeParams::default();
        Self {
            lower_percentile: p.lower_percentile,
            upper_percentile: p.upper_percentile,
            min_samples: p.min_samples,
        }
    }
}

/// Residual horizon section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualSection {
    /// Cumulative residual window in minutes
    pub window: usize,
}

impl Default for ResidualSection {
    fn default() -> Self {
        Self {
            window: ResidualParams::default().window,
        }
    }
}

/// Signal section; threshold and hysteresis are fractions (0.01 = 1%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSection {
    pub threshold_pct: f64,
    pub hysteresis_pct: f64,
    pub cooldown_minutes: i64,
}

impl Default for SignalSection {
    fn default() -> Self {
        let p = SignalParams::default();
        Self {
            threshold_pct: p.threshold,
            hysteresis_pct: p.hysteresis,
            cooldown_minutes: p.cooldown_minutes,
        }
    }
}

/// Orchestrator runtime section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Wait for the second leg of a minute, in milliseconds
    pub pairing_timeout_ms: u64,
    /// Bounded emission queue capacity
    pub emission_buffer: usize,
    /// Forward per-bar metrics to sinks
    pub emit_metrics: bool,
    /// Evictions between running-sum resyncs (0 = once per window)
    pub resync_interval: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let p = RuntimeParams::default();
        Self {
            pairing_timeout_ms: p.pairing_timeout_ms,
            emission_buffer: p.emission_buffer,
            emit_metrics: p.emit_metrics,
            resync_interval: p.resync_interval,
        }
    }
}

/// Output sinks section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksSection {
    /// Log signals (info) and metrics (debug) through tracing
    pub log: bool,
    /// Append emissions to this JSON-lines file
    pub jsonl_path: Option<String>,
    /// Also write metrics records to the JSON-lines file
    pub jsonl_metrics: bool,
}

impl Default for SinksSection {
    fn default() -> Self {
        Self {
            log: true,
            jsonl_path: None,
            jsonl_metrics: false,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Emit JSON log lines instead of plain text
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Load configuration from a TOML file, apply environment overrides, validate
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Load from `path` when given, otherwise start from defaults
pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{} has an invalid value: {:?}", name, raw))
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ValidationError(format!(
            "{} has an invalid value: {:?}",
            name, raw
        ))),
    }
}

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WINDOW_REG") {
            self.regression.window = parse_env("WINDOW_REG", &v)?;
        }
        if let Some(v) = lookup("WINDOW_WARMUP") {
            self.regression.warmup = parse_env("WINDOW_WARMUP", &v)?;
        }
        if let Some(v) = lookup("WINDOW_CUM") {
            self.residual.window = parse_env("WINDOW_CUM", &v)?;
        }
        if let Some(v) = lookup("EWMA_LAMBDA") {
            self.regression.ewma_lambda = parse_env("EWMA_LAMBDA", &v)?;
        }
        if let Some(v) = lookup("THRESHOLD_PCT") {
            self.signal.threshold_pct = parse_env("THRESHOLD_PCT", &v)?;
        }
        if let Some(v) = lookup("HYSTERESIS_PCT") {
            self.signal.hysteresis_pct = parse_env("HYSTERESIS_PCT", &v)?;
        }
        if let Some(v) = lookup("COOLDOWN_MIN") {
            self.signal.cooldown_minutes = parse_env("COOLDOWN_MIN", &v)?;
        }
        if let Some(v) = lookup("SYMBOL_ETH") {
            self.pair.dependent = v.trim().to_string();
        }
        if let Some(v) = lookup("SYMBOL_BTC") {
            self.pair.explanatory = v.trim().to_string();
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = lookup("LOG_JSON") {
            self.logging.json = parse_bool("LOG_JSON", &v)?;
        }
        Ok(())
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pipeline in self.pipeline_configs() {
            pipeline.validate().map_err(|e| {
                ConfigError::ValidationError(format!("{}: {}", pipeline.pair.label(), e))
            })?;
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.logging.level
            )));
        }

        if let Some(path) = &self.sinks.jsonl_path {
            if path.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "sinks.jsonl_path cannot be empty".to_string(),
                ));
            }
        }

        let mut labels: Vec<String> = self.pipeline_configs().iter().map(|p| p.pair.label()).collect();
        labels.sort();
        if labels.windows(2).any(|w| w[0].eq_ignore_ascii_case(&w[1])) {
            return Err(ConfigError::ValidationError(
                "the same pair is configured twice".to_string(),
            ));
        }

        Ok(())
    }

    /// One pipeline configuration per monitored pair, primary first
    pub fn pipeline_configs(&self) -> Vec<PipelineConfig> {
        let primary = PipelineConfig::from(self);
        let mut configs = Vec::with_capacity(1 + self.extra_pairs.len());
        for pair in &self.extra_pairs {
            let mut extra = primary.clone();
            extra.pair = pair.into();
            configs.push(extra);
        }
        configs.insert(0, primary);
        configs
    }
}

impl From<&PairSection> for PairParams {
    fn from(pair: &PairSection) -> Self {
        PairParams {
            explanatory_symbol: pair.explanatory.trim().to_ascii_uppercase(),
            dependent_symbol: pair.dependent.trim().to_ascii_uppercase(),
            event_name: pair.event_name.clone(),
        }
    }
}

// Conversion from Config to the primary pair's PipelineConfig
impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        PipelineConfig {
            pair: (&config.pair).into(),
            regression: RegressionParams {
                window: config.regression.window,
                warmup: config.regression.warmup,
                ewma_lambda: config.regression.ewma_lambda,
                var_epsilon: config.regression.var_epsilon,
            },
            winsorize: WinsorizeParams {
                lower_percentile: config.winsorize.lower_percentile,
                upper_percentile: config.winsorize.upper_percentile,
                min_samples: config.winsorize.min_samples,
            },
            residual: ResidualParams {
                window: config.residual.window,
            },
            signal: SignalParams {
                threshold: config.signal.threshold_pct,
                hysteresis: config.signal.hysteresis_pct,
                cooldown_minutes: config.signal.cooldown_minutes,
            },
            runtime: RuntimeParams {
                pairing_timeout_ms: config.pipeline.pairing_timeout_ms,
                emission_buffer: config.pipeline.emission_buffer,
                emit_metrics: config.pipeline.emit_metrics,
                resync_interval: config.pipeline.resync_interval,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[pair]
explanatory = "btcusdt"
dependent = "ethusdt"

[regression]
window = 180
warmup = 90
ewma_lambda = 0.9

[residual]
window = 30

[signal]
threshold_pct = 0.015
hysteresis_pct = 0.003
cooldown_minutes = 15

[pipeline]
pairing_timeout_ms = 2000

[sinks]
jsonl_path = "out/emissions.jsonl"
jsonl_metrics = true

[logging]
level = "debug"

[[extra_pairs]]
explanatory = "BTCUSDT"
dependent = "SOLUSDT"
event_name = "SOL_OWN_MOVE"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_valid_config() {
        let config: Config = toml::from_str(&create_valid_config()).unwrap();
        assert!(config.validate().is_ok());

        let pipeline = PipelineConfig::from(&config);
        assert_eq!(pipeline.pair.explanatory_symbol, "BTCUSDT");
        assert_eq!(pipeline.regression.window, 180);
        assert_eq!(pipeline.regression.var_epsilon, 1e-12);
        assert_eq!(pipeline.residual.window, 30);
        assert_eq!(pipeline.signal.threshold, 0.015);
        assert_eq!(pipeline.runtime.pairing_timeout_ms, 2000);
        assert_eq!(config.sinks.jsonl_path.as_deref(), Some("out/emissions.jsonl"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        let pipeline = PipelineConfig::from(&config);
        assert_eq!(pipeline, PipelineConfig::default());
        assert!(config.sinks.log);
    }

    #[test]
    fn test_extra_pairs_inherit_settings() {
        let config: Config = toml::from_str(&create_valid_config()).unwrap();
        let pipelines = config.pipeline_configs();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[1].pair.label(), "SOLUSDT/BTCUSDT");
        assert_eq!(pipelines[1].pair.event_name, "SOL_OWN_MOVE");
        assert_eq!(pipelines[1].regression.window, 180);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("[regression\nwindow = ");
        assert!(matches!(load_config(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_hysteresis() {
        let mut config = Config::default();
        config.signal.hysteresis_pct = 0.02;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let mut config = Config::default();
        config.extra_pairs.push(PairSection::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WINDOW_REG", "300"),
            ("WINDOW_WARMUP", "150"),
            ("WINDOW_CUM", "45"),
            ("EWMA_LAMBDA", "0.97"),
            ("THRESHOLD_PCT", "0.02"),
            ("HYSTERESIS_PCT", "0.005"),
            ("COOLDOWN_MIN", "10"),
            ("SYMBOL_ETH", "SOLUSDT"),
            ("SYMBOL_BTC", "ETHUSDT"),
            ("LOG_LEVEL", "WARN"),
            ("LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides_with(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.regression.window, 300);
        assert_eq!(config.regression.warmup, 150);
        assert_eq!(config.residual.window, 45);
        assert_eq!(config.regression.ewma_lambda, 0.97);
        assert_eq!(config.signal.threshold_pct, 0.02);
        assert_eq!(config.signal.hysteresis_pct, 0.005);
        assert_eq!(config.signal.cooldown_minutes, 10);
        assert_eq!(config.pair.dependent, "SOLUSDT");
        assert_eq!(config.pair.explanatory, "ETHUSDT");
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_parse_error() {
        let mut config = Config::default();
        let result = config.apply_env_overrides_with(|name| {
            (name == "WINDOW_REG").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_no_env_leaves_config_untouched() {
        let mut config: Config = toml::from_str(&create_valid_config()).unwrap();
        let before = config.clone();
        config.apply_env_overrides_with(no_env).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(&create_valid_config());
        // process env may carry overrides; only check file-only fields
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.extra_pairs.len(), 1);
        assert_eq!(config.pipeline.pairing_timeout_ms, 2000);
    }

    #[test]
    fn test_shipped_default_matches_builtin() {
        let content = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        let config: Config = toml::from_str(&content).unwrap();
        assert_eq!(config, Config::default());
    }
}
