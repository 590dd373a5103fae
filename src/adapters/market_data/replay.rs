//! Replay Bar Feed
//!
//! Streams bars from a newline-delimited JSON file. Each line is either a
//! Binance kline payload (combined or raw stream) or a plain bar record
//! `{"symbol", "open_time", "close_time", "close_price"}`. Blank lines and
//! unclosed klines are skipped; malformed lines are logged and skipped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::adapters::binance::decode_line;
use crate::domain::bar::Bar;
use crate::ports::market_data::{BarFeed, FeedError};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ReplayFeed {
    path: PathBuf,
    /// Only forward these symbols; empty forwards everything
    symbols: Vec<String>,
}

impl ReplayFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            symbols: Vec::new(),
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn accepts(&self, bar: &Bar) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| *s == bar.symbol)
    }

    /// Read and decode the whole file
    pub async fn load(&self) -> Result<Vec<Bar>, FeedError> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut bars = Vec::new();
        let mut line_no = 0;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if let Some(bar) = self.decode(line_no, &line) {
                bars.push(bar);
            }
        }
        Ok(bars)
    }

    fn decode(&self, line_no: usize, line: &str) -> Option<Bar> {
        if line.trim().is_empty() {
            return None;
        }
        match decode_line(line) {
            Ok(Some(bar)) if self.accepts(&bar) => Some(bar),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    line = line_no,
                    error = %e,
                    "Skipping malformed replay line"
                );
                None
            }
        }
    }
}

#[async_trait]
impl BarFeed for ReplayFeed {
    async fn subscribe(&self) -> Result<mpsc::Receiver<Bar>, FeedError> {
        let file = File::open(&self.path).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let feed = self.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();
            let mut line_no = 0;
            let mut sent = 0usize;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_no += 1;
                        if let Some(bar) = feed.decode(line_no, &line) {
                            if tx.send(bar).await.is_err() {
                                break;
                            }
                            sent += 1;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(path = %feed.path.display(), error = %e, "Replay read failed");
                        break;
                    }
                }
            }
            tracing::info!(path = %feed.path.display(), bars = sent, "Replay finished");
        });

        Ok(rx)
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}
