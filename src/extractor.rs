//! Batch extractor - decodes a message payload into article records
//!
//! Wire format: UTF-8 JSON array of article objects. Only `title` and
//! `description` are read; other fields are ignored. A missing or `null`
//! field reads as the empty string.
//!
//! Failure handling:
//! - payload not UTF-8 / not JSON / not an array → `DecodeError`, zero records
//! - one malformed entry → that entry is skipped, the rest of the batch survives
//! - blank article (title and description both empty after trimming) → dropped

use crate::source::RawMessage;
use crate::types::ArticleRecord;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is not an array of articles (found {0})")]
    NotAnArray(&'static str),
}

#[derive(Debug, Deserialize)]
struct WireArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Lazy, one-pass sequence of articles decoded from one message.
///
/// Entries are deserialized as they are pulled. Malformed and blank entries
/// are counted and skipped.
#[derive(Debug)]
pub struct ArticleBatch {
    entries: std::vec::IntoIter<Value>,
    index: usize,
    malformed: usize,
    blank: usize,
}

impl ArticleBatch {
    fn new(entries: Vec<Value>) -> Self {
        Self {
            entries: entries.into_iter(),
            index: 0,
            malformed: 0,
            blank: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Entries skipped so far because they were not article-shaped
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Entries dropped so far because their text was blank
    pub fn blank(&self) -> usize {
        self.blank
    }
}

impl Iterator for ArticleBatch {
    type Item = ArticleRecord;

    fn next(&mut self) -> Option<ArticleRecord> {
        for entry in self.entries.by_ref() {
            let index = self.index;
            self.index += 1;

            let wire = match WireArticle::deserialize(&entry) {
                Ok(wire) if entry.is_object() => wire,
                Ok(_) => {
                    self.malformed += 1;
                    log::warn!("⚠️  Skipping batch entry {}: not an object", index);
                    continue;
                }
                Err(e) => {
                    self.malformed += 1;
                    log::warn!("⚠️  Skipping malformed batch entry {}: {}", index, e);
                    continue;
                }
            };

            let article = ArticleRecord {
                title: wire.title.unwrap_or_default(),
                description: wire.description.unwrap_or_default(),
            };

            if article.is_blank() {
                self.blank += 1;
                continue;
            }

            return Some(article);
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entries.len()))
    }
}

/// Decode a payload, reporting whole-batch failures to the caller
pub fn decode_batch(payload: &[u8]) -> Result<ArticleBatch, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Array(entries) => Ok(ArticleBatch::new(entries)),
        Value::Object(_) => Err(DecodeError::NotAnArray("object")),
        Value::String(_) => Err(DecodeError::NotAnArray("string")),
        Value::Number(_) => Err(DecodeError::NotAnArray("number")),
        Value::Bool(_) => Err(DecodeError::NotAnArray("bool")),
        Value::Null => Err(DecodeError::NotAnArray("null")),
    }
}

/// Decode a message; a whole-batch failure is logged and yields no articles
pub fn extract_articles(message: &RawMessage) -> Result<ArticleBatch, DecodeError> {
    decode_batch(&message.payload).map_err(|e| {
        let preview: String = String::from_utf8_lossy(&message.payload)
            .chars()
            .take(100)
            .collect();
        log::warn!(
            "⚠️  Failed to decode message (partition {:?}, offset {:?}): {} | payload: {}...",
            message.partition,
            message.offset,
            e,
            preview
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_article_array() {
        let payload = br#"[
            {"title": "AAPL surges", "description": "Apple stock up", "url": "https://example.com"},
            {"title": "Nothing relevant", "description": "no mention"}
        ]"#;

        let articles: Vec<ArticleRecord> = decode_batch(payload).unwrap().collect();
        assert_eq!(
            articles,
            vec![
                ArticleRecord::new("AAPL surges", "Apple stock up"),
                ArticleRecord::new("Nothing relevant", "no mention"),
            ]
        );
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        assert!(matches!(decode_batch(b"not json {"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_batch(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(
            decode_batch(br#"{"title": "single object"}"#),
            Err(DecodeError::NotAnArray("object"))
        ));
    }

    #[test]
    fn test_malformed_entries_skipped_individually() {
        let payload = br#"[
            42,
            {"title": 7, "description": "wrong title type"},
            {"title": "TSLA deliveries", "description": "beat estimates"},
            "a string"
        ]"#;

        let mut batch = decode_batch(payload).unwrap();
        let articles: Vec<ArticleRecord> = batch.by_ref().collect();

        assert_eq!(articles, vec![ArticleRecord::new("TSLA deliveries", "beat estimates")]);
        assert_eq!(batch.malformed(), 3);
    }

    #[test]
    fn test_blank_articles_dropped_silently() {
        let payload = br#"[
            {"title": "   ", "description": ""},
            {"title": null},
            {},
            {"description": "GOOG only in description"}
        ]"#;

        let mut batch = decode_batch(payload).unwrap();
        let articles: Vec<ArticleRecord> = batch.by_ref().collect();

        assert_eq!(articles, vec![ArticleRecord::new("", "GOOG only in description")]);
        assert_eq!(batch.blank(), 3);
        assert_eq!(batch.malformed(), 0);
    }

    #[test]
    fn test_extract_articles_reports_failure() {
        let message = RawMessage::new(b"garbage".to_vec()).with_position(0, 17);
        assert!(extract_articles(&message).is_err());

        let message = RawMessage::new(b"[]".to_vec());
        assert_eq!(extract_articles(&message).unwrap().count(), 0);
    }
}
