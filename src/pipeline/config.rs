//! Pipeline configuration from environment variables

use crate::backoff::ExponentialBackoff;
use crate::persistence::SnapshotConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which broker adapter feeds the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// JSONL spool file `<BROKER_ADDRESS>/<INPUT_TOPIC>.jsonl`
    File,
    #[cfg(feature = "kafka")]
    Kafka,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            #[cfg(feature = "kafka")]
            SourceKind::Kafka => "kafka",
        }
    }
}

impl Default for SourceKind {
    #[cfg(feature = "kafka")]
    fn default() -> Self {
        SourceKind::Kafka
    }

    #[cfg(not(feature = "kafka"))]
    fn default() -> Self {
        SourceKind::File
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" | "jsonl" => Ok(SourceKind::File),
            #[cfg(feature = "kafka")]
            "kafka" => Ok(SourceKind::Kafka),
            #[cfg(not(feature = "kafka"))]
            "kafka" => Err(ConfigError::InvalidValue(
                "SOURCE_KIND=kafka requires building with --features kafka".to_string(),
            )),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown SOURCE_KIND '{}' (expected file or kafka)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Configuration for pipeline runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_kind: SourceKind,

    /// Kafka bootstrap servers, or spool directory for the file source
    pub broker_address: String,

    pub topic: String,

    /// Kafka consumer group
    pub consumer_group: String,

    /// Replay from the earliest retained message on every run (Kafka: no
    /// offsets committed). When false, resume from the group's committed offset.
    pub from_beginning: bool,

    /// File source only: keep tailing at EOF instead of stopping
    pub follow: bool,

    pub snapshot_path: PathBuf,

    pub tracked_tickers: Vec<String>,

    /// Extraction/scoring/matching workers
    pub workers: usize,

    /// Aggregator shard tasks
    pub shards: usize,

    /// Capacity of each inter-stage channel
    pub channel_buffer: usize,

    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_retries: u32,

    pub snapshot_retry_initial_ms: u64,
    pub snapshot_retry_max_ms: u64,
    pub snapshot_max_retries: u32,

    /// Minimum spacing between snapshot writes (0 = write after every drained burst)
    pub snapshot_min_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_kind: SourceKind::default(),
            broker_address: "localhost:9092".to_string(),
            topic: "raw_articles".to_string(),
            consumer_group: "newsflow-sentiment".to_string(),
            from_beginning: true,
            follow: true,
            snapshot_path: PathBuf::from("analyzed_data/sentiment_results.json"),
            tracked_tickers: vec!["AAPL".to_string(), "TSLA".to_string(), "GOOG".to_string()],
            workers: 4,
            shards: 4,
            channel_buffer: 1_000,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            reconnect_max_retries: 10,
            snapshot_retry_initial_ms: 100,
            snapshot_retry_max_ms: 2_000,
            snapshot_max_retries: 5,
            snapshot_min_interval_ms: 0,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SOURCE_KIND` (default: kafka with the `kafka` feature, file otherwise)
    /// - `BROKER_ADDRESS` (default: localhost:9092)
    /// - `INPUT_TOPIC` (default: raw_articles)
    /// - `CONSUMER_GROUP` (default: newsflow-sentiment)
    /// - `SOURCE_FROM_BEGINNING` (default: true)
    /// - `SOURCE_FOLLOW` (default: true)
    /// - `SNAPSHOT_PATH` (default: analyzed_data/sentiment_results.json)
    /// - `TRACKED_TICKERS` (default: AAPL,TSLA,GOOG)
    /// - `PIPELINE_WORKERS` (default: 4)
    /// - `AGGREGATOR_SHARDS` (default: 4)
    /// - `CHANNEL_BUFFER` (default: 1000)
    /// - `RECONNECT_INITIAL_MS` / `RECONNECT_MAX_MS` / `RECONNECT_MAX_RETRIES` (default: 500 / 30000 / 10)
    /// - `SNAPSHOT_RETRY_INITIAL_MS` / `SNAPSHOT_RETRY_MAX_MS` / `SNAPSHOT_MAX_RETRIES` (default: 100 / 2000 / 5)
    /// - `SNAPSHOT_MIN_INTERVAL_MS` (default: 0)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let source_kind = match lookup("SOURCE_KIND") {
            Some(value) => value.parse()?,
            None => defaults.source_kind,
        };

        let tracked_tickers = match lookup("TRACKED_TICKERS") {
            Some(value) => value
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            None => defaults.tracked_tickers.clone(),
        };

        let config = Self {
            source_kind,
            broker_address: lookup("BROKER_ADDRESS").unwrap_or(defaults.broker_address),
            topic: lookup("INPUT_TOPIC").unwrap_or(defaults.topic),
            consumer_group: lookup("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            from_beginning: parse_or(&lookup, "SOURCE_FROM_BEGINNING", defaults.from_beginning),
            follow: parse_or(&lookup, "SOURCE_FOLLOW", defaults.follow),
            snapshot_path: lookup("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            tracked_tickers,
            workers: parse_or(&lookup, "PIPELINE_WORKERS", defaults.workers),
            shards: parse_or(&lookup, "AGGREGATOR_SHARDS", defaults.shards),
            channel_buffer: parse_or(&lookup, "CHANNEL_BUFFER", defaults.channel_buffer),
            reconnect_initial_ms: parse_or(&lookup, "RECONNECT_INITIAL_MS", defaults.reconnect_initial_ms),
            reconnect_max_ms: parse_or(&lookup, "RECONNECT_MAX_MS", defaults.reconnect_max_ms),
            reconnect_max_retries: parse_or(&lookup, "RECONNECT_MAX_RETRIES", defaults.reconnect_max_retries),
            snapshot_retry_initial_ms: parse_or(&lookup, "SNAPSHOT_RETRY_INITIAL_MS", defaults.snapshot_retry_initial_ms),
            snapshot_retry_max_ms: parse_or(&lookup, "SNAPSHOT_RETRY_MAX_MS", defaults.snapshot_retry_max_ms),
            snapshot_max_retries: parse_or(&lookup, "SNAPSHOT_MAX_RETRIES", defaults.snapshot_max_retries),
            snapshot_min_interval_ms: parse_or(&lookup, "SNAPSHOT_MIN_INTERVAL_MS", defaults.snapshot_min_interval_ms),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tracked_tickers.is_empty() {
            return Err(ConfigError::InvalidValue(
                "TRACKED_TICKERS must name at least one symbol".to_string(),
            ));
        }
        if self.tracked_tickers.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "TRACKED_TICKERS cannot contain empty symbols".to_string(),
            ));
        }
        if self.broker_address.trim().is_empty() {
            return Err(ConfigError::MissingVariable("BROKER_ADDRESS".to_string()));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::MissingVariable("INPUT_TOPIC".to_string()));
        }
        for (name, value) in [
            ("PIPELINE_WORKERS", self.workers),
            ("AGGREGATOR_SHARDS", self.shards),
            ("CHANNEL_BUFFER", self.channel_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }

    pub fn reconnect_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect_initial_ms),
            Duration::from_millis(self.reconnect_max_ms),
            self.reconnect_max_retries,
        )
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            path: self.snapshot_path.clone(),
            retry_initial: Duration::from_millis(self.snapshot_retry_initial_ms),
            retry_max: Duration::from_millis(self.snapshot_retry_max_ms),
            max_retries: self.snapshot_max_retries,
            min_interval: Duration::from_millis(self.snapshot_min_interval_ms),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', defaulting to {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
