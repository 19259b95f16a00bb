//! Ticker matcher - fans a scored article out to one mention per tracked symbol
//!
//! Matching is a literal, case-sensitive substring test against the title and
//! the description separately. There is no word-boundary check: "GOOG" matches
//! inside "GOOGLE". Each distinct symbol yields at most one mention per article.

use crate::types::{ScoredArticle, TickerMention};

#[derive(Debug, Clone)]
pub struct TickerMatcher {
    tickers: Vec<String>,
}

impl TickerMatcher {
    /// Build from the configured symbols; duplicates and empty entries are ignored
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for ticker in tickers {
            let ticker = ticker.into();
            if ticker.is_empty() || unique.contains(&ticker) {
                continue;
            }
            unique.push(ticker);
        }
        Self { tickers: unique }
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Tracked symbols appearing in the title or description, in configured order
    pub fn matching_tickers<'a>(&'a self, title: &str, description: &str) -> Vec<&'a str> {
        self.tickers
            .iter()
            .filter(|ticker| title.contains(ticker.as_str()) || description.contains(ticker.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// One mention per matching symbol, each carrying the article score unchanged
    pub fn mentions(&self, scored: &ScoredArticle) -> Vec<TickerMention> {
        self.matching_tickers(&scored.article.title, &scored.article.description)
            .into_iter()
            .map(|ticker| TickerMention::new(ticker, scored.score))
            .collect()
    }
}
