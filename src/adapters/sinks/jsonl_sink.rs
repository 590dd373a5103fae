//! JSON-lines Sink
//!
//! Append-only local storage of emissions, one object per line:
//!
//!   {"kind":"signal","ts":"2025-01-01T12:30:00Z","event":"ETH_OWN_MOVE",...}
//!   {"kind":"metrics","timestamp":"...","symbol_pair":"ETHUSDT/BTCUSDT",...}

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::domain::signal::Emission;
use crate::ports::sink::{EmissionSink, SinkError};

#[derive(Serialize)]
struct Line<'a, T: Serialize> {
    kind: &'static str,
    #[serde(flatten)]
    payload: &'a T,
}

#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    include_metrics: bool,
}

impl JsonlSink {
    /// Open (or create) the file in append mode, creating parent directories
    pub async fn open(path: impl AsRef<Path>, include_metrics: bool) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            include_metrics,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(emission: &Emission) -> Result<String, SinkError> {
        let line = match emission {
            Emission::Signal(event) => serde_json::to_string(&Line {
                kind: emission.kind(),
                payload: &event.to_record(),
            })?,
            Emission::Metrics(record) => serde_json::to_string(&Line {
                kind: emission.kind(),
                payload: record,
            })?,
        };
        Ok(line)
    }
}

#[async_trait]
impl EmissionSink for JsonlSink {
    async fn publish(&self, emission: &Emission) -> Result<(), SinkError> {
        if matches!(emission, Emission::Metrics(_)) && !self.include_metrics {
            return Ok(());
        }
        let mut line = Self::encode(emission)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        writer.get_mut().sync_all().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
