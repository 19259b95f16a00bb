//! Kafka topic subscription via rdkafka's `StreamConsumer`
//!
//! Offset handling:
//! - replay (`from_beginning`): every partition is assigned at the beginning
//!   and nothing is committed, so each run rebuilds the aggregates from the
//!   earliest retained message.
//! - live: offsets are stored manually and auto-committed. A message's offset
//!   is stored only on the next `recv`, once the pipeline has taken the
//!   message, so in-flight messages are redelivered after a crash.

use super::{MessageSource, RawMessage, SourceError};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use std::time::Duration;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

pub struct KafkaSource {
    brokers: String,
    topic: String,
    group_id: String,
    from_beginning: bool,
    consumer: Option<StreamConsumer>,
    /// Last (partition, offset) handed out and not yet stored
    unstored: Option<(i32, i64)>,
}

impl KafkaSource {
    pub fn new(brokers: &str, topic: &str, group_id: &str, from_beginning: bool) -> Self {
        Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            from_beginning,
            consumer: None,
            unstored: None,
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.partition.eof", "false");

        if self.from_beginning {
            config
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", "earliest");
        } else {
            config
                .set("enable.auto.commit", "true")
                .set("enable.auto.offset.store", "false")
                .set("auto.offset.reset", "latest");
        }
        config
    }

    /// Assign every partition of the topic at its first offset
    fn assign_from_beginning(&self, consumer: &StreamConsumer) -> Result<(), SourceError> {
        let metadata = consumer
            .fetch_metadata(Some(&self.topic), METADATA_TIMEOUT)
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        let mut assignment = TopicPartitionList::new();
        for topic in metadata.topics().iter().filter(|t| t.name() == self.topic) {
            for partition in topic.partitions() {
                assignment
                    .add_partition_offset(&self.topic, partition.id(), Offset::Beginning)
                    .map_err(|e| SourceError::Connection(e.to_string()))?;
            }
        }
        if assignment.count() == 0 {
            return Err(SourceError::Connection(format!(
                "topic '{}' has no partitions yet",
                self.topic
            )));
        }

        consumer
            .assign(&assignment)
            .map_err(|e| SourceError::Connection(e.to_string()))
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        // Drop any previous consumer before rejoining; its unstored offset is redelivered
        self.consumer = None;
        self.unstored = None;

        let consumer: StreamConsumer = self
            .client_config()
            .create()
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        if self.from_beginning {
            self.assign_from_beginning(&consumer)?;
            log::info!(
                "🔌 Replaying Kafka topic '{}' on {} from the earliest offset",
                self.topic,
                self.brokers
            );
        } else {
            consumer
                .subscribe(&[self.topic.as_str()])
                .map_err(|e| SourceError::Connection(e.to_string()))?;
            log::info!(
                "🔌 Subscribed to Kafka topic '{}' on {} (group {})",
                self.topic,
                self.brokers,
                self.group_id
            );
        }

        self.consumer = Some(consumer);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
        let consumer = self.consumer.as_ref().ok_or(SourceError::NotConnected)?;

        // The previous message has been taken by the pipeline; mark it for commit.
        // A committed offset names the next message to read.
        if let Some((partition, offset)) = self.unstored.take() {
            if let Err(e) = consumer.store_offset(&self.topic, partition, offset + 1) {
                log::warn!("⚠️  Failed to store offset {}:{}: {}", partition, offset, e);
            }
        }

        loop {
            let message = consumer
                .recv()
                .await
                .map_err(|e| SourceError::Connection(e.to_string()))?;

            match message.payload() {
                Some(payload) => {
                    if !self.from_beginning {
                        self.unstored = Some((message.partition(), message.offset()));
                    }
                    return Ok(Some(
                        RawMessage::new(payload.to_vec())
                            .with_position(message.partition(), message.offset()),
                    ));
                }
                None => {
                    log::debug!(
                        "Skipping empty Kafka message at {}:{}",
                        message.partition(),
                        message.offset()
                    );
                }
            }
        }
    }

    fn source_type(&self) -> &'static str {
        "kafka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_mode_never_commits() {
        let source = KafkaSource::new("localhost:9092", "raw_articles", "newsflow", true);
        let config = source.client_config();

        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
    }

    #[test]
    fn test_live_mode_stores_offsets_manually() {
        let source = KafkaSource::new("localhost:9092", "raw_articles", "newsflow", false);
        let config = source.client_config();

        assert_eq!(config.get("enable.auto.commit"), Some("true"));
        assert_eq!(config.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(config.get("auto.offset.reset"), Some("latest"));
    }
}
