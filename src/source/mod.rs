//! Source adapters - yield raw message payloads from a broker topic
//!
//! Every adapter implements [`MessageSource`]. Delivery is at-least-once:
//! a reconnect may replay messages, and nothing downstream deduplicates them.
//!
//! - `channel` - in-process mpsc receiver (embedding, tests)
//! - `file` - JSONL spool file tail (`<broker dir>/<topic>.jsonl`)
//! - `kafka` - rdkafka consumer (requires the `kafka` feature)
//! - `reconnect` - bounded exponential-backoff wrapper around any adapter

pub mod channel;
pub mod file;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod reconnect;

use async_trait::async_trait;

pub use channel::ChannelSource;
pub use file::FileSource;
#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;
pub use reconnect::ReconnectingSource;

use crate::pipeline::config::{PipelineConfig, SourceKind};

/// Opaque payload delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub payload: Vec<u8>,
    /// Broker position, when the adapter has one (logging only)
    pub partition: Option<i32>,
    pub offset: Option<i64>,
}

impl RawMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            partition: None,
            offset: None,
        }
    }

    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.partition = Some(partition);
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Broker unreachable or the subscription dropped; retryable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Reconnect budget used up; fatal
    #[error("Source unavailable after {attempts} reconnect attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Source is not connected")]
    NotConnected,
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Connection(_) | SourceError::NotConnected)
    }
}

/// A subscription to one topic on a message broker
#[async_trait]
pub trait MessageSource: Send {
    /// Establish (or re-establish) the subscription
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Wait for the next message. `Ok(None)` means the source is closed.
    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError>;

    /// Get source type for logging
    fn source_type(&self) -> &'static str;
}

#[async_trait]
impl MessageSource for Box<dyn MessageSource> {
    async fn connect(&mut self) -> Result<(), SourceError> {
        (**self).connect().await
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
        (**self).recv().await
    }

    fn source_type(&self) -> &'static str {
        (**self).source_type()
    }
}

/// Build the adapter selected by `SOURCE_KIND`, wrapped with reconnect handling
pub fn build_source(config: &PipelineConfig) -> ReconnectingSource<Box<dyn MessageSource>> {
    let inner: Box<dyn MessageSource> = match config.source_kind {
        SourceKind::File => Box::new(FileSource::from_broker(
            &config.broker_address,
            &config.topic,
            config.from_beginning,
            config.follow,
        )),
        #[cfg(feature = "kafka")]
        SourceKind::Kafka => Box::new(KafkaSource::new(
            &config.broker_address,
            &config.topic,
            &config.consumer_group,
            config.from_beginning,
        )),
    };

    ReconnectingSource::new(inner, config.reconnect_backoff())
}
