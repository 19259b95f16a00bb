//! Pipeline engine - wires the stages together and owns their lifecycle
//!
//! ```text
//! source loop ──RawMessage──▶ worker pool ──TickerMention──▶ shards ──TickerAggregate──▶ sink
//! ```
//!
//! Shutdown is a cascade: the source loop stops pulling and drops its sender,
//! workers drain the queue and drop their routers, shards drain and drop their
//! update senders, and the sink writes one final snapshot before returning.

use super::config::PipelineConfig;
use super::ingestion::{run_source_loop, run_worker, ArticleProcessor};
use super::stats::{PipelineStats, StatsSnapshot};
use crate::aggregator::{spawn_shards, system_clock, Clock};
use crate::matcher::TickerMatcher;
use crate::persistence::{snapshot_sink_task, SnapshotSink};
use crate::scorer::{LexiconScorer, SentimentScorer};
use crate::source::{MessageSource, SourceError};
use crate::types::TickerAggregate;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The source gave up (retries exhausted or non-retryable failure)
    #[error("Message source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Pipeline task {task} panicked: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: JoinError,
    },
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stats: StatsSnapshot,
    /// Final published view, sorted by ticker
    pub aggregates: Vec<TickerAggregate>,
}

/// Pipeline builder
pub struct Pipeline {
    config: PipelineConfig,
    scorer: Arc<dyn SentimentScorer>,
    clock: Clock,
}

impl Pipeline {
    /// Pipeline using the lexicon scorer and the system clock
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            scorer: Arc::new(LexiconScorer::new()),
            clock: system_clock(),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Override the timestamp source used for `updated_at`
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start every stage on the current runtime.
    ///
    /// The returned handle requests shutdown and waits for the final report.
    /// Dropping it (and every trigger) without calling `join` also stops ingestion.
    pub fn spawn<S>(self, source: S) -> PipelineHandle
    where
        S: MessageSource + 'static,
    {
        let stats = Arc::new(PipelineStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_pipeline(
            self.config,
            self.scorer,
            self.clock,
            source,
            shutdown_rx,
            stats.clone(),
        ));

        PipelineHandle {
            shutdown: ShutdownTrigger(Arc::new(shutdown_tx)),
            stats,
            task,
        }
    }
}

/// Cloneable shutdown request, usable after the handle moved into `join`
#[derive(Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // Receiver gone means the source loop already finished
        let _ = self.0.send(true);
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    shutdown: ShutdownTrigger,
    stats: Arc<PipelineStats>,
    task: JoinHandle<Result<PipelineReport, PipelineError>>,
}

impl PipelineHandle {
    /// Stop pulling new messages; in-flight work still drains
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the pipeline to finish draining
    pub async fn join(self) -> Result<PipelineReport, PipelineError> {
        let PipelineHandle { shutdown, task, .. } = self;
        let result = task.await.map_err(|source| PipelineError::Task {
            task: "supervisor",
            source,
        })?;
        drop(shutdown);
        result
    }

    /// Request shutdown and wait for the final report
    pub async fn shutdown_and_join(self) -> Result<PipelineReport, PipelineError> {
        self.shutdown();
        self.join().await
    }
}

async fn run_pipeline<S>(
    config: PipelineConfig,
    scorer: Arc<dyn SentimentScorer>,
    clock: Clock,
    source: S,
    shutdown: watch::Receiver<bool>,
    stats: Arc<PipelineStats>,
) -> Result<PipelineReport, PipelineError>
where
    S: MessageSource + 'static,
{
    let buffer = config.channel_buffer.max(1);
    let worker_count = config.workers.max(1);

    log::info!(
        "🚀 Starting pipeline: {} workers, {} shards, tracking [{}]",
        worker_count,
        config.shards.max(1),
        config.tracked_tickers.join(", ")
    );

    // Sink first so no update is produced without a consumer
    let (update_tx, update_rx) = mpsc::channel(buffer);
    let sink = SnapshotSink::new(config.snapshot_config());
    let sink_handle = tokio::spawn(snapshot_sink_task(update_rx, sink, stats.clone()));

    let (router, shard_handles) = spawn_shards(config.shards, buffer, update_tx, clock);

    let (message_tx, message_rx) = mpsc::channel(buffer);
    let queue = Arc::new(Mutex::new(message_rx));
    let processor = Arc::new(ArticleProcessor::new(
        scorer,
        TickerMatcher::new(config.tracked_tickers.iter().cloned()),
    ));

    let worker_handles: Vec<JoinHandle<()>> = (0..worker_count)
        .map(|id| {
            tokio::spawn(run_worker(
                id,
                queue.clone(),
                processor.clone(),
                router.clone(),
                stats.clone(),
            ))
        })
        .collect();
    drop(router);

    let source_result = run_source_loop(source, message_tx, shutdown, stats.clone()).await;

    for handle in worker_handles {
        handle
            .await
            .map_err(|source| PipelineError::Task { task: "worker", source })?;
    }
    for handle in shard_handles {
        handle
            .await
            .map_err(|source| PipelineError::Task { task: "shard", source })?;
    }
    let view = sink_handle
        .await
        .map_err(|source| PipelineError::Task { task: "snapshot sink", source })?;

    let stats = stats.snapshot();
    log::info!("📊 Pipeline finished: {}", stats);

    source_result?;
    Ok(PipelineReport {
        stats,
        aggregates: view.to_vec(),
    })
}
