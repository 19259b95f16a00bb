use super::{MessageSource, RawMessage, SourceError};
use crate::backoff::ExponentialBackoff;
use async_trait::async_trait;

/// Wraps a source with bounded reconnect attempts.
///
/// Retryable failures from `connect` or `recv` trigger a backoff sleep and a
/// reconnect. The backoff resets after every delivered message. Once the
/// budget is spent the wrapper returns `SourceError::RetriesExhausted`.
pub struct ReconnectingSource<S> {
    inner: S,
    backoff: ExponentialBackoff,
    connected: bool,
}

impl<S: MessageSource> ReconnectingSource<S> {
    pub fn new(inner: S, backoff: ExponentialBackoff) -> Self {
        Self {
            inner,
            backoff,
            connected: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn retry_after(&mut self, error: SourceError) -> Result<(), SourceError> {
        log::error!("❌ {} source failure: {}", self.inner.source_type(), error);
        self.connected = false;
        self.backoff
            .sleep()
            .await
            .map_err(|_| SourceError::RetriesExhausted {
                attempts: self.backoff.attempts(),
                last_error: error.to_string(),
            })
    }

    async fn ensure_connected(&mut self) -> Result<(), SourceError> {
        while !self.connected {
            match self.inner.connect().await {
                Ok(()) => {
                    log::info!("✅ Connected to {} source", self.inner.source_type());
                    self.connected = true;
                }
                Err(e) if e.is_retryable() => self.retry_after(e).await?,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: MessageSource> MessageSource for ReconnectingSource<S> {
    async fn connect(&mut self) -> Result<(), SourceError> {
        self.ensure_connected().await
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
        loop {
            self.ensure_connected().await?;

            match self.inner.recv().await {
                Ok(Some(message)) => {
                    self.backoff.reset();
                    return Ok(Some(message));
                }
                Ok(None) => return Ok(None),
                Err(e) if e.is_retryable() => self.retry_after(e).await?,
                Err(e) => return Err(e),
            }
        }
    }

    fn source_type(&self) -> &'static str {
        self.inner.source_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted source: each entry is the outcome of one connect/recv call
    struct FlakySource {
        connects: VecDeque<Result<(), String>>,
        messages: VecDeque<Result<Option<RawMessage>, String>>,
        connect_calls: u32,
    }

    #[async_trait]
    impl MessageSource for FlakySource {
        async fn connect(&mut self) -> Result<(), SourceError> {
            self.connect_calls += 1;
            match self.connects.pop_front() {
                Some(Err(e)) => Err(SourceError::Connection(e)),
                _ => Ok(()),
            }
        }

        async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
            match self.messages.pop_front() {
                Some(Ok(message)) => Ok(message),
                Some(Err(e)) => Err(SourceError::Connection(e)),
                None => Ok(None),
            }
        }

        fn source_type(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_backoff(retries: u32) -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), retries)
    }

    #[tokio::test]
    async fn test_reconnects_after_transient_failures() {
        let inner = FlakySource {
            connects: VecDeque::from(vec![Err("refused".to_string()), Ok(()), Ok(())]),
            messages: VecDeque::from(vec![
                Err("broker went away".to_string()),
                Ok(Some(RawMessage::new(b"[]".to_vec()))),
            ]),
            connect_calls: 0,
        };
        let mut source = ReconnectingSource::new(inner, fast_backoff(3));

        let message = source.recv().await.unwrap().unwrap();
        assert_eq!(message.payload, b"[]".to_vec());
        assert_eq!(source.into_inner().connect_calls, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_fatal() {
        let inner = FlakySource {
            connects: VecDeque::from(vec![
                Err("refused".to_string()),
                Err("refused".to_string()),
                Err("refused".to_string()),
            ]),
            messages: VecDeque::new(),
            connect_calls: 0,
        };
        let mut source = ReconnectingSource::new(inner, fast_backoff(2));

        match source.recv().await {
            Err(SourceError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("refused"));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_source_is_not_retried() {
        let inner = FlakySource {
            connects: VecDeque::new(),
            messages: VecDeque::new(),
            connect_calls: 0,
        };
        let mut source = ReconnectingSource::new(inner, fast_backoff(2));

        assert!(source.recv().await.unwrap().is_none());
        assert_eq!(source.into_inner().connect_calls, 1);
    }
}
