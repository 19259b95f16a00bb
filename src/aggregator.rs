//! Aggregator shards - single-owner tasks serializing updates per ticker
//!
//! The ticker space is split over N shard tasks by a stable hash. A shard
//! exclusively owns the `AggregateState` for its tickers and applies mentions
//! in arrival order, so every update for a ticker reads the state left by the
//! previous one. Shards never share state; their output goes to the snapshot
//! sink over a channel.

use crate::state::AggregateState;
use crate::types::{TickerAggregate, TickerMention};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timestamp source for `updated_at` (injectable for tests)
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Shard index for a ticker (FNV-1a, stable across runs)
pub fn shard_for(ticker: &str, shards: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in ticker.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % shards.max(1) as u64) as usize
}

#[derive(Debug, thiserror::Error)]
#[error("Aggregator shard {0} is no longer running")]
pub struct ShardClosed(pub usize);

/// Routes mentions to the shard owning their ticker
#[derive(Clone)]
pub struct MentionRouter {
    shards: Vec<mpsc::Sender<TickerMention>>,
}

impl MentionRouter {
    pub async fn route(&self, mention: TickerMention) -> Result<(), ShardClosed> {
        let index = shard_for(&mention.ticker, self.shards.len());
        self.shards[index]
            .send(mention)
            .await
            .map_err(|_| ShardClosed(index))
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

/// Spawn `count` shard tasks feeding `updates`.
///
/// Each handle resolves to the shard's final state once every router clone
/// has been dropped and its queue is drained.
pub fn spawn_shards(
    count: usize,
    buffer: usize,
    updates: mpsc::Sender<TickerAggregate>,
    clock: Clock,
) -> (MentionRouter, Vec<JoinHandle<AggregateState>>) {
    let count = count.max(1);
    let mut senders = Vec::with_capacity(count);
    let mut handles = Vec::with_capacity(count);

    for id in 0..count {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        senders.push(tx);
        handles.push(tokio::spawn(shard_task(id, rx, updates.clone(), clock.clone())));
    }

    log::info!("🧮 Spawned {} aggregator shards", count);
    (MentionRouter { shards: senders }, handles)
}

async fn shard_task(
    id: usize,
    mut rx: mpsc::Receiver<TickerMention>,
    updates: mpsc::Sender<TickerAggregate>,
    clock: Clock,
) -> AggregateState {
    let mut state = AggregateState::new();
    let mut sink_open = true;

    while let Some(mention) = rx.recv().await {
        let aggregate = state.apply(&mention, clock());

        log::info!(
            "Updated sentiment for {}: {:.2} based on {} articles",
            aggregate.ticker,
            aggregate.sentiment,
            aggregate.article_count
        );

        if sink_open && updates.send(aggregate).await.is_err() {
            log::warn!("⚠️  Shard {}: snapshot sink closed, updates no longer published", id);
            sink_open = false;
        }
    }

    log::debug!("Shard {} stopped ({} tickers)", id, state.len());
    state
}
