//! # newsflow
//!
//! Streaming news sentiment aggregation keyed by ticker symbol.
//!
//! ## Architecture
//!
//! ```text
//! MessageSource (Kafka / JSONL tail / channel)
//!     ↓ RawMessage
//! ingestion workers: extract → score → match
//!     ↓ TickerMention (routed by ticker hash)
//! aggregator shards (single owner per ticker)
//!     ↓ TickerAggregate
//! snapshot sink (temp file + atomic rename)
//! ```
//!
//! Stages upstream of the shards are stateless and run on a worker pool.
//! Each ticker lives in exactly one shard, so updates for the same ticker are
//! applied in order while other shards proceed concurrently. The sink is the
//! only stage that touches the filesystem.

pub mod backoff;
pub mod extractor;
pub mod matcher;
pub mod persistence;
pub mod pipeline;
pub mod scorer;
pub mod source;
pub mod state;
pub mod types;
mod aggregator;

pub use aggregator::{shard_for, spawn_shards, system_clock, Clock, MentionRouter, ShardClosed};
pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineHandle, PipelineReport, PipelineStats, StatsSnapshot,
};
pub use types::{ArticleRecord, ScoredArticle, SentimentLabel, TickerAggregate, TickerMention};
