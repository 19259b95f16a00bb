//! JSONL spool source: tails `<broker dir>/<topic>.jsonl`, one payload per line
//!
//! Follow mode polls for appended lines and reopens the file when it is
//! rotated (inode change) or truncated. Non-follow mode ends at EOF, which
//! makes it usable for replaying a captured topic.

use super::{MessageSource, RawMessage, SourceError};
use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

pub struct FileSource {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    position: u64,
    pending: Vec<u8>,
    from_beginning: bool,
    follow: bool,
    connected_once: bool,
    line_number: i64,
    poll_interval: Duration,
}

impl FileSource {
    pub fn new(path: PathBuf, from_beginning: bool, follow: bool) -> Self {
        Self {
            path,
            file: None,
            inode: None,
            position: 0,
            pending: Vec::new(),
            from_beginning,
            follow,
            connected_once: false,
            line_number: 0,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Spool layout: the broker address is a directory, the topic a file stem
    pub fn from_broker(broker_dir: &str, topic: &str, from_beginning: bool, follow: bool) -> Self {
        let path = Path::new(broker_dir).join(format!("{}.jsonl", topic));
        Self::new(path, from_beginning, follow)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&mut self, start: SeekFrom) -> Result<(), SourceError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| SourceError::Connection(format!("{}: {}", self.path.display(), e)))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        #[cfg(unix)]
        {
            self.inode = Some(metadata.ino());
        }
        #[cfg(not(unix))]
        {
            let _ = &metadata;
        }

        let mut reader = BufReader::new(file);
        self.position = reader
            .seek(start)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        self.pending.clear();
        self.file = Some(reader);
        Ok(())
    }

    /// Detect if the file has been rotated (inode changed) or truncated
    async fn detect_rotation(&self) -> Result<bool, SourceError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| SourceError::Connection(format!("{}: {}", self.path.display(), e)))?;

        #[cfg(unix)]
        {
            if self.inode.map_or(false, |old| old != metadata.ino()) {
                return Ok(true);
            }
        }

        Ok(metadata.len() < self.position)
    }

    /// Hand the buffered line over as-is; payload validation happens downstream
    fn take_line(&mut self) -> Option<RawMessage> {
        let line = std::mem::take(&mut self.pending);
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        self.line_number += 1;
        Some(RawMessage {
            payload: trimmed.to_vec(),
            partition: None,
            offset: Some(self.line_number),
        })
    }
}

#[async_trait]
impl MessageSource for FileSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        let start = if !self.connected_once {
            if self.from_beginning {
                SeekFrom::Start(0)
            } else {
                SeekFrom::End(0)
            }
        } else {
            // Resume where we left off unless the file was replaced meanwhile
            let previous_inode = self.inode;
            // Re-read any unterminated line from its first byte
            let previous_position = self.position - self.pending.len() as u64;
            self.open(SeekFrom::Start(0)).await?;
            let same_file = previous_inode.is_none() || previous_inode == self.inode;
            if same_file {
                SeekFrom::Start(previous_position)
            } else {
                SeekFrom::Start(0)
            }
        };

        self.open(start).await?;
        self.connected_once = true;
        log::info!("📖 Reading spool file: {} (offset {})", self.path.display(), self.position);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<RawMessage>, SourceError> {
        loop {
            if self.follow && self.detect_rotation().await? {
                log::info!("🔄 File rotation detected, reopening: {}", self.path.display());
                self.line_number = 0;
                self.open(SeekFrom::Start(0)).await?;
            }

            let reader = self.file.as_mut().ok_or(SourceError::NotConnected)?;
            let read = reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|e| SourceError::Connection(e.to_string()))?;
            self.position += read as u64;

            if read == 0 {
                if !self.follow {
                    // EOF ends a replay; flush a final unterminated line
                    return Ok(self.take_line());
                }
                sleep(self.poll_interval).await;
                continue;
            }

            if !self.pending.ends_with(b"\n") {
                // Partial line; wait for the writer to finish it
                if self.follow {
                    continue;
                }
                return Ok(self.take_line());
            }

            if let Some(message) = self.take_line() {
                return Ok(Some(message));
            }
        }
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_replay_reads_all_lines_then_closes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("raw_articles.jsonl");
        tokio::fs::write(&file_path, b"[1]\n\n[2]\n[3]").await.unwrap();

        let mut source = FileSource::from_broker(
            temp_dir.path().to_str().unwrap(),
            "raw_articles",
            true,
            false,
        );
        source.connect().await.unwrap();

        let mut payloads = Vec::new();
        while let Some(message) = source.recv().await.unwrap() {
            payloads.push(String::from_utf8(message.payload).unwrap());
        }
        assert_eq!(payloads, vec!["[1]", "[2]", "[3]"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_passed_through() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("raw_articles.jsonl");
        tokio::fs::write(&file_path, b"[1]\n\xff\xfe garbage\n[2]\n").await.unwrap();

        let mut source = FileSource::new(file_path, true, false);
        source.connect().await.unwrap();

        let mut payloads = Vec::new();
        while let Some(message) = source.recv().await.unwrap() {
            payloads.push(message.payload);
        }
        assert_eq!(
            payloads,
            vec![b"[1]".to_vec(), b"\xff\xfe garbage".to_vec(), b"[2]".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_retryable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut source = FileSource::new(temp_dir.path().join("absent.jsonl"), true, true);

        let err = source.connect().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_follow_starts_at_end_and_sees_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("topic.jsonl");
        tokio::fs::write(&file_path, b"old\n").await.unwrap();

        let mut source = FileSource::new(file_path.clone(), false, true)
            .with_poll_interval(Duration::from_millis(10));
        source.connect().await.unwrap();

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&file_path)
            .await
            .unwrap();
        file.write_all(b"new\n").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let message = tokio::time::timeout(Duration::from_secs(2), source.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(message.payload, b"new".to_vec());
    }
}
