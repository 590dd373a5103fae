use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::bar::Bar;

/// Bar feed error type
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data parsing error at line {line}: {reason}")]
    ParseError { line: usize, reason: String },

    #[error("Subscription error: {0}")]
    SubscriptionError(String),
}

/// Source of closed bars.
///
/// The receiver yields bars in the order the source produced them; ordering
/// and pairing are enforced downstream. The channel closes when the source
/// is exhausted.
#[async_trait]
pub trait BarFeed: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<Bar>, FeedError>;

    /// Symbols this feed produces
    fn symbols(&self) -> Vec<String>;
}
