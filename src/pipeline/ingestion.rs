//! Pipeline ingestion - source loop and stateless article workers
//!
//! The source loop is the only task that pulls from the broker. It pushes raw
//! messages into a bounded queue shared by the worker pool. Each worker runs
//! extract → score → match on a message and routes the resulting mentions to
//! the aggregator shards. Nothing here holds state between messages.

use super::stats::PipelineStats;
use crate::aggregator::MentionRouter;
use crate::extractor::extract_articles;
use crate::matcher::TickerMatcher;
use crate::scorer::{bounded_score, SentimentScorer};
use crate::source::{MessageSource, RawMessage, SourceError};
use crate::types::{ArticleRecord, ScoredArticle, TickerMention};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};

/// Stateless per-message processing: extract, score, match
pub struct ArticleProcessor {
    scorer: Arc<dyn SentimentScorer>,
    matcher: TickerMatcher,
}

impl ArticleProcessor {
    pub fn new(scorer: Arc<dyn SentimentScorer>, matcher: TickerMatcher) -> Self {
        Self { scorer, matcher }
    }

    /// Score and match one article. Scorer failures skip the article.
    pub fn process_article(&self, article: ArticleRecord, stats: &PipelineStats) -> Vec<TickerMention> {
        let score = match bounded_score(self.scorer.as_ref(), &article.text()) {
            Ok(score) => score,
            Err(e) => {
                stats.record_score_failure();
                log::warn!("⚠️  Skipping article '{}': {}", article.title, e);
                return Vec::new();
            }
        };
        stats.record_article_scored();

        let scored = ScoredArticle { article, score };
        let mentions = self.matcher.mentions(&scored);
        if mentions.is_empty() {
            log::debug!("No tracked ticker in article '{}'", scored.article.title);
        }
        mentions
    }

    /// All mentions produced by one message (empty on decode failure)
    pub fn process_message(&self, message: &RawMessage, stats: &PipelineStats) -> Vec<TickerMention> {
        let mut batch = match extract_articles(message) {
            Ok(batch) => batch,
            Err(_) => {
                stats.record_decode_failure();
                return Vec::new();
            }
        };

        let mut mentions = Vec::new();
        for article in batch.by_ref() {
            mentions.extend(self.process_article(article, stats));
        }
        if batch.malformed() > 0 {
            stats.record_malformed_entries(batch.malformed());
        }
        mentions
    }
}

/// Pull messages until shutdown, end of stream, or a fatal source error.
///
/// Dropping `tx` on return lets the workers drain the queue and exit.
pub async fn run_source_loop<S: MessageSource>(
    mut source: S,
    tx: mpsc::Sender<RawMessage>,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<PipelineStats>,
) -> Result<(), SourceError> {
    log::info!("📡 Starting {} source", source.source_type());

    tokio::select! {
        _ = shutdown.changed() => {
            log::info!("🛑 Shutdown requested before the source connected");
            return Ok(());
        }
        connected = source.connect() => {
            if let Err(e) = connected {
                log::error!("❌ Fatal source error: {}", e);
                return Err(e);
            }
        }
    }

    let mut message_count = 0u64;
    let mut last_log_time = Instant::now();

    loop {
        if *shutdown.borrow() {
            log::info!("🛑 Shutdown requested, no longer pulling messages");
            return Ok(());
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    log::info!("🛑 Pipeline handle dropped, no longer pulling messages");
                    return Ok(());
                }
            }
            result = source.recv() => match result {
                Ok(Some(message)) => {
                    stats.record_message();
                    message_count += 1;

                    // Log throughput every 10 seconds
                    if last_log_time.elapsed().as_secs() >= 10 {
                        let rate = message_count as f64 / last_log_time.elapsed().as_secs_f64();
                        log::info!("📊 Ingestion rate: {:.1} messages/sec ({})", rate, stats.snapshot());
                        last_log_time = Instant::now();
                        message_count = 0;
                    }

                    if tx.send(message).await.is_err() {
                        log::warn!("⚠️  Worker queue closed, stopping source");
                        return Ok(());
                    }
                }
                Ok(None) => {
                    log::info!("Source closed, draining pipeline");
                    return Ok(());
                }
                Err(e) => {
                    log::error!("❌ Fatal source error: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

/// Worker: take messages from the shared queue until it closes
pub async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<RawMessage>>>,
    processor: Arc<ArticleProcessor>,
    router: MentionRouter,
    stats: Arc<PipelineStats>,
) {
    loop {
        let message = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        let Some(message) = message else { break };

        for mention in processor.process_message(&message, &stats) {
            stats.record_mention();
            if let Err(e) = router.route(mention).await {
                log::error!("❌ Worker {}: {}", id, e);
                return;
            }
        }
    }

    log::debug!("Worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ScoreError;

    fn processor_with(scorer: Arc<dyn SentimentScorer>) -> ArticleProcessor {
        ArticleProcessor::new(scorer, TickerMatcher::new(["AAPL", "TSLA", "GOOG"]))
    }

    fn text_length_scorer() -> Arc<dyn SentimentScorer> {
        // Deterministic stand-in: polarity derived from the text itself
        Arc::new(|text: &str| -> Result<f64, ScoreError> { Ok((text.len() % 10) as f64 / 10.0) })
    }

    #[test]
    fn test_single_relevant_article_in_batch() {
        let scorer = text_length_scorer();
        let processor = processor_with(scorer.clone());
        let stats = PipelineStats::default();
        let message = RawMessage::new(
            br#"[{"title":"AAPL surges","description":"Apple stock up"},
                {"title":"Nothing relevant","description":"no mention"}]"#
                .to_vec(),
        );

        let mentions = processor.process_message(&message, &stats);

        let expected = scorer.score("AAPL surges. Apple stock up").unwrap();
        assert_eq!(mentions, vec![TickerMention::new("AAPL", expected)]);
        assert_eq!(stats.snapshot().articles_scored, 2);
    }

    #[test]
    fn test_malformed_payload_yields_nothing() {
        let processor = processor_with(text_length_scorer());
        let stats = PipelineStats::default();

        let mentions = processor.process_message(&RawMessage::new(b"{not json".to_vec()), &stats);
        assert!(mentions.is_empty());
        assert_eq!(stats.snapshot().decode_failures, 1);
    }

    #[test]
    fn test_scorer_failure_skips_only_that_article() {
        let scorer: Arc<dyn SentimentScorer> = Arc::new(|text: &str| -> Result<f64, ScoreError> {
            if text.contains("boom") {
                Err(ScoreError::Failed("model crashed".to_string()))
            } else {
                Ok(0.3)
            }
        });
        let processor = processor_with(scorer);
        let stats = PipelineStats::default();
        let message = RawMessage::new(
            br#"[{"title":"TSLA boom","description":""},{"title":"GOOG steady","description":""}]"#.to_vec(),
        );

        let mentions = processor.process_message(&message, &stats);
        assert_eq!(mentions, vec![TickerMention::new("GOOG", 0.3)]);
        assert_eq!(stats.snapshot().score_failures, 1);
    }

    #[tokio::test]
    async fn test_source_loop_stops_on_shutdown() {
        let (_source_tx, source) = crate::source::ChannelSource::channel(4);
        let (tx, _rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(PipelineStats::default());

        let handle = tokio::spawn(run_source_loop(source, tx, shutdown_rx, stats));
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
