use async_trait::async_trait;
use thiserror::Error;

use crate::domain::signal::Emission;

/// Emission sink error type
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink closed: {0}")]
    Closed(String),
}

/// Downstream consumer of signals and per-bar metrics.
///
/// Sinks run on the dispatcher task, never on a pair's pipeline, so a slow
/// sink only fills the bounded emission queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmissionSink: Send + Sync {
    /// Deliver one emission
    async fn publish(&self, emission: &Emission) -> Result<(), SinkError>;

    /// Persist anything buffered; called once on shutdown
    async fn flush(&self) -> Result<(), SinkError>;

    fn name(&self) -> &'static str;
}
