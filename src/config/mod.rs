//! Configuration Module
//!
//! Loads and validates configuration from TOML files with environment
//! overrides.

pub mod loader;

pub use loader::{
    load_config, load_or_default, Config, ConfigError, LoggingSection, PairSection,
    PipelineSection, SinksSection,
};
