//! Snapshot Report - print the published sentiment snapshot
//!
//! Usage:
//!   cargo run --bin snapshot_report [path]
//!
//! The path defaults to `SNAPSHOT_PATH`, then analyzed_data/sentiment_results.json.

use dotenv::dotenv;
use newsflow::persistence::{read_snapshot, SnapshotConfig};
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("SNAPSHOT_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| SnapshotConfig::default().path);

    let Some(aggregates) = read_snapshot(&path)? else {
        println!("No sentiment data available yet.");
        return Ok(());
    };

    if aggregates.is_empty() {
        println!("No sentiment data available yet.");
        return Ok(());
    }

    println!("Sentiment snapshot: {}", path.display());
    println!();
    println!("{:<8} {:>10} {:<8} {:>9}  {}", "TICKER", "SENTIMENT", "LABEL", "ARTICLES", "UPDATED");
    println!("{}", "─".repeat(72));
    for aggregate in &aggregates {
        println!(
            "{:<8} {:>+10.3} {:<8} {:>9}  {}",
            aggregate.ticker,
            aggregate.sentiment,
            aggregate.label().as_str(),
            aggregate.article_count,
            aggregate.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
