//! Core records flowing through the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentiment above this average is reported as bullish
pub const BULLISH_THRESHOLD: f64 = 0.2;

/// Sentiment below this average is reported as bearish
pub const BEARISH_THRESHOLD: f64 = -0.2;

/// A single news article decoded from a message batch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub description: String,
}

impl ArticleRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Text handed to the scorer: `"{title}. {description}"`
    pub fn text(&self) -> String {
        format!("{}. {}", self.title, self.description)
    }

    /// True when both title and description are blank
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// Article together with its polarity score in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub article: ArticleRecord,
    pub score: f64,
}

/// One (ticker, score) pairing produced by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct TickerMention {
    pub ticker: String,
    pub score: f64,
}

impl TickerMention {
    pub fn new(ticker: impl Into<String>, score: f64) -> Self {
        Self {
            ticker: ticker.into(),
            score,
        }
    }
}

/// Published per-ticker aggregate (one element of the snapshot array)
///
/// `sentiment` is the running average of every score applied to the ticker,
/// `article_count` the number of mentions that contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerAggregate {
    pub ticker: String,
    pub sentiment: f64,
    pub article_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl TickerAggregate {
    pub fn label(&self) -> SentimentLabel {
        SentimentLabel::from_sentiment(self.sentiment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Bullish,
    Neutral,
    Bearish,
}

impl SentimentLabel {
    pub fn from_sentiment(sentiment: f64) -> Self {
        if sentiment > BULLISH_THRESHOLD {
            SentimentLabel::Bullish
        } else if sentiment < BEARISH_THRESHOLD {
            SentimentLabel::Bearish
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "BULLISH",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Bearish => "BEARISH",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_text_joins_title_and_description() {
        let article = ArticleRecord::new("AAPL surges", "Apple stock up");
        assert_eq!(article.text(), "AAPL surges. Apple stock up");
    }

    #[test]
    fn test_blank_article_detection() {
        assert!(ArticleRecord::new("  ", "\n\t").is_blank());
        assert!(ArticleRecord::default().is_blank());
        assert!(!ArticleRecord::new("", "only description").is_blank());
    }

    #[test]
    fn test_sentiment_labels() {
        // Thresholds are exclusive
        assert_eq!(SentimentLabel::from_sentiment(0.21), SentimentLabel::Bullish);
        assert_eq!(SentimentLabel::from_sentiment(0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_sentiment(-0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_sentiment(-0.5), SentimentLabel::Bearish);
        assert_eq!(SentimentLabel::Bearish.to_string(), "BEARISH");
    }

    #[test]
    fn test_aggregate_wire_format() {
        let aggregate = TickerAggregate {
            ticker: "TSLA".to_string(),
            sentiment: 0.25,
            article_count: 4,
            updated_at: "2024-05-01T12:00:00Z".parse().unwrap(),
        };

        let value = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(value["ticker"], "TSLA");
        assert_eq!(value["sentiment"], 0.25);
        assert_eq!(value["article_count"], 4);
        assert_eq!(value["updated_at"], "2024-05-01T12:00:00Z");
    }
}
