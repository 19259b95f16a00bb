//! Snapshot sink - publishes the full aggregate set as one JSON artifact
//!
//! Every publish rewrites the whole file: the JSON array is written to a
//! temporary file in the same directory, synced, then renamed over the
//! published path. Readers see either the previous snapshot or the new one,
//! never a partial file.

use crate::backoff::ExponentialBackoff;
use crate::pipeline::stats::PipelineStats;
use crate::types::TickerAggregate;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot not written after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Latest aggregate per ticker, as handed over by the aggregator shards
#[derive(Debug, Default, Clone)]
pub struct SnapshotView {
    aggregates: BTreeMap<String, TickerAggregate>,
}

impl SnapshotView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `aggregate` unless a newer one (higher count) is already held
    pub fn record(&mut self, aggregate: TickerAggregate) -> bool {
        match self.aggregates.get(&aggregate.ticker) {
            Some(current) if current.article_count >= aggregate.article_count => false,
            _ => {
                self.aggregates.insert(aggregate.ticker.clone(), aggregate);
                true
            }
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerAggregate> {
        self.aggregates.get(ticker)
    }

    /// Aggregates sorted by ticker
    pub fn to_vec(&self) -> Vec<TickerAggregate> {
        self.aggregates.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }
}

/// Snapshot sink configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub path: PathBuf,
    pub retry_initial: Duration,
    pub retry_max: Duration,
    pub max_retries: u32,
    /// Minimum time between publishes; 0 publishes as soon as the queue is drained
    pub min_interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("analyzed_data/sentiment_results.json"),
            retry_initial: Duration::from_millis(100),
            retry_max: Duration::from_secs(2),
            max_retries: 5,
            min_interval: Duration::ZERO,
        }
    }
}

pub struct SnapshotSink {
    config: SnapshotConfig,
}

impl SnapshotSink {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Single publish attempt (blocking I/O runs off the async workers)
    pub async fn publish(&self, aggregates: Vec<TickerAggregate>) -> Result<(), SinkError> {
        let path = self.config.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &aggregates))
            .await
            .map_err(|e| SinkError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Publish with bounded backoff. On exhaustion the previous file stays in place.
    pub async fn publish_with_retry(&self, aggregates: Vec<TickerAggregate>) -> Result<(), SinkError> {
        let mut backoff = ExponentialBackoff::new(
            self.config.retry_initial,
            self.config.retry_max,
            self.config.max_retries,
        );

        loop {
            match self.publish(aggregates.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("⚠️  Failed to write snapshot {}: {}", self.config.path.display(), e);
                    if backoff.sleep().await.is_err() {
                        return Err(SinkError::RetriesExhausted {
                            attempts: backoff.attempts() + 1,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Write `aggregates` to `path` via temp file + atomic rename
pub fn write_snapshot(path: &Path, aggregates: &[TickerAggregate]) -> Result<(), SinkError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".snapshot-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, aggregates)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    log::debug!("Saved {} aggregates to {}", aggregates.len(), path.display());
    Ok(())
}

/// Load the published snapshot. `Ok(None)` when nothing has been published yet.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Option<Vec<TickerAggregate>>, SinkError> {
    let json = match std::fs::read_to_string(path.as_ref()) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&json)?))
}

/// Background task that folds aggregator updates into the view and publishes it.
///
/// Updates already queued are folded in before each write, so bursts coalesce
/// into one publish. Runs until every update sender is dropped, then performs
/// a final publish and returns the final view.
pub async fn snapshot_sink_task(
    mut rx: mpsc::Receiver<TickerAggregate>,
    sink: SnapshotSink,
    stats: Arc<PipelineStats>,
) -> SnapshotView {
    let min_interval = sink.config.min_interval;
    let mut view = SnapshotView::new();
    let mut dirty = false;
    let mut last_publish: Option<Instant> = None;

    log::info!("💾 Snapshot sink writing to {}", sink.path().display());

    'outer: while let Some(update) = rx.recv().await {
        dirty |= view.record(update);

        // Coalesce: drain what is queued, then wait out the debounce window
        let deadline = last_publish.map(|at| at + min_interval);
        loop {
            while let Ok(update) = rx.try_recv() {
                dirty |= view.record(update);
            }
            let Some(deadline) = deadline else { break };
            if Instant::now() >= deadline {
                break;
            }
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(update)) => dirty |= view.record(update),
                Ok(None) => break 'outer,
                Err(_) => break,
            }
        }

        if dirty {
            publish(&sink, &view, &stats).await;
            dirty = false;
            last_publish = Some(Instant::now());
        }
    }

    // Final flush before exit
    if dirty || !view.is_empty() {
        log::info!("🔄 Writing final snapshot ({} tickers)", view.len());
        publish(&sink, &view, &stats).await;
    }

    log::info!("✅ Snapshot sink stopped");
    view
}

async fn publish(sink: &SnapshotSink, view: &SnapshotView, stats: &PipelineStats) {
    match sink.publish_with_retry(view.to_vec()).await {
        Ok(()) => stats.record_snapshot_published(),
        Err(e) => {
            stats.record_snapshot_failure();
            log::error!("❌ {} (previous snapshot left in place)", e);
        }
    }
}
