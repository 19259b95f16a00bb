//! Pipeline counters shared by every stage

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    messages_received: AtomicU64,
    decode_failures: AtomicU64,
    malformed_entries: AtomicU64,
    articles_scored: AtomicU64,
    score_failures: AtomicU64,
    mentions_emitted: AtomicU64,
    snapshots_published: AtomicU64,
    snapshot_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub malformed_entries: u64,
    pub articles_scored: u64,
    pub score_failures: u64,
    pub mentions_emitted: u64,
    pub snapshots_published: u64,
    pub snapshot_failures: u64,
}

impl PipelineStats {
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed_entries(&self, count: usize) {
        self.malformed_entries.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_article_scored(&self) {
        self.articles_scored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_score_failure(&self) {
        self.score_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mention(&self) {
        self.mentions_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_published(&self) {
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            malformed_entries: self.malformed_entries.load(Ordering::Relaxed),
            articles_scored: self.articles_scored.load(Ordering::Relaxed),
            score_failures: self.score_failures.load(Ordering::Relaxed),
            mentions_emitted: self.mentions_emitted.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "messages={} decode_failures={} malformed={} scored={} score_failures={} mentions={} snapshots={} snapshot_failures={}",
            self.messages_received,
            self.decode_failures,
            self.malformed_entries,
            self.articles_scored,
            self.score_failures,
            self.mentions_emitted,
            self.snapshots_published,
            self.snapshot_failures
        )
    }
}
