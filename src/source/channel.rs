//! In-process source backed by a tokio mpsc channel

use super::{MessageSource, RawMessage, SourceError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Yields payloads pushed through the paired sender.
///
/// The source closes once every sender has been dropped and the buffer is empty.
pub struct ChannelSource {
    rx: mpsc::Receiver<RawMessage>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<RawMessage>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/source pair
    pub fn channel(buffer: usize) -> (mpsc::Sender<RawMessage>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
        Ok(self.rx.recv().await)
    }

    fn source_type(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(RawMessage::new(b"[]".to_vec())).await.unwrap();
        drop(tx);

        source.connect().await.unwrap();
        let first = source.recv().await.unwrap();
        assert_eq!(first.map(|m| m.payload), Some(b"[]".to_vec()));
        assert!(source.recv().await.unwrap().is_none());
    }
}
