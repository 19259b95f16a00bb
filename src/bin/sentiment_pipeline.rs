//! Sentiment Pipeline - streaming news sentiment per ticker
//!
//! Consumes JSON article batches from the input topic, scores each article,
//! aggregates a running average per tracked ticker, and keeps the snapshot
//! file up to date.
//!
//! Usage:
//!   cargo run --release --bin sentiment_pipeline
//!   cargo run --release --features kafka --bin sentiment_pipeline
//!
//! Environment variables (see `PipelineConfig::from_env` for the full list):
//!   SOURCE_KIND - kafka | file
//!   BROKER_ADDRESS - Kafka bootstrap servers, or spool directory for `file`
//!   INPUT_TOPIC - Topic name (default: raw_articles)
//!   SNAPSHOT_PATH - Output file (default: analyzed_data/sentiment_results.json)
//!   TRACKED_TICKERS - Comma-separated symbols (default: AAPL,TSLA,GOOG)

use dotenv::dotenv;
use log::{error, info};
use newsflow::pipeline::{Pipeline, PipelineConfig};
use newsflow::scorer::LexiconScorer;
use newsflow::source::build_source;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Sentiment Pipeline");

    let config = PipelineConfig::from_env()?;

    info!("✅ Configuration loaded");
    info!("   ├─ Source: {} @ {}", config.source_kind.as_str(), config.broker_address);
    info!("   ├─ Topic: {}", config.topic);
    info!("   ├─ Snapshot: {}", config.snapshot_path.display());
    info!("   ├─ Tickers: {}", config.tracked_tickers.join(", "));
    info!("   └─ Workers/shards: {}/{}", config.workers, config.shards);

    let source = build_source(&config);
    let handle = Pipeline::new(config)
        .with_scorer(Arc::new(LexiconScorer::new()))
        .spawn(source);

    let trigger = handle.shutdown_trigger();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
        }
        trigger.trigger();
    });

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match handle.join().await {
        Ok(report) => {
            info!("📊 Final stats: {}", report.stats);
            info!("✅ Pipeline stopped ({} tickers in final snapshot)", report.aggregates.len());
            Ok(())
        }
        Err(e) => {
            error!("❌ Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
