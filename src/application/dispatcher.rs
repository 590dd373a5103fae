//! Emission Dispatcher
//!
//! Decouples computation from delivery. Pipelines push into a bounded queue
//! with `try_send` and never wait; a single task owns the sinks, drains the
//! queue and flushes every sink once all senders are gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::domain::signal::Emission;
use crate::ports::sink::EmissionSink;

/// Cloneable producer side, one per pipeline task
#[derive(Debug, Clone)]
pub struct EmissionHandle {
    tx: mpsc::Sender<Emission>,
    dropped: Arc<AtomicU64>,
}

impl EmissionHandle {
    /// Queue an emission without blocking. Returns false if it was dropped.
    pub fn emit(&self, emission: Emission) -> bool {
        match self.tx.try_send(emission) {
            Ok(()) => true,
            Err(TrySendError::Full(emission)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    kind = emission.kind(),
                    ts = %emission.timestamp(),
                    dropped_total = total,
                    "Emission queue full, dropping"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Emission dispatcher closed, dropping");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Delivery counters reported when the dispatcher finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub sink_failures: u64,
    pub dropped: u64,
}

pub struct EmissionDispatcher {
    handle: JoinHandle<DispatchStats>,
    dropped: Arc<AtomicU64>,
}

impl EmissionDispatcher {
    /// Start the delivery task with a queue of `capacity` emissions
    pub fn spawn(
        sinks: Vec<Arc<dyn EmissionSink>>,
        capacity: usize,
    ) -> (EmissionHandle, EmissionDispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let handle = tokio::spawn(deliver(rx, sinks));
        (
            EmissionHandle {
                tx,
                dropped: dropped.clone(),
            },
            EmissionDispatcher { handle, dropped },
        )
    }

    /// Wait for the queue to drain and the sinks to flush.
    ///
    /// Completes only after every [`EmissionHandle`] has been dropped.
    pub async fn join(self) -> DispatchStats {
        let mut stats = match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!("Emission dispatcher task failed: {}", e);
                DispatchStats::default()
            }
        };
        stats.dropped = self.dropped.load(Ordering::Relaxed);
        stats
    }
}

async fn deliver(
    mut rx: mpsc::Receiver<Emission>,
    sinks: Vec<Arc<dyn EmissionSink>>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    while let Some(emission) = rx.recv().await {
        for sink in &sinks {
            if let Err(e) = sink.publish(&emission).await {
                stats.sink_failures += 1;
                tracing::warn!(sink = sink.name(), error = %e, "Sink publish failed");
            }
        }
        stats.delivered += 1;
    }

    for sink in &sinks {
        if let Err(e) = sink.flush().await {
            stats.sink_failures += 1;
            tracing::warn!(sink = sink.name(), error = %e, "Sink flush failed");
        }
    }
    tracing::info!(
        delivered = stats.delivered,
        sink_failures = stats.sink_failures,
        "Emission dispatcher stopped"
    );
    stats
}
