use crate::types::{TickerAggregate, TickerMention};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Running totals for one ticker
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickerTotals {
    pub count: u64,
    pub sum: f64,
}

impl TickerTotals {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// In-memory aggregation state: ticker → (count, cumulative score)
///
/// Pure transition only, no I/O. Entries are created on first mention and
/// never removed; counts only grow.
#[derive(Debug, Default)]
pub struct AggregateState {
    totals: HashMap<String, TickerTotals>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one mention into the state and return the updated aggregate
    pub fn apply(&mut self, mention: &TickerMention, now: DateTime<Utc>) -> TickerAggregate {
        let totals = self.totals.entry(mention.ticker.clone()).or_default();
        totals.count += 1;
        totals.sum += mention.score;

        TickerAggregate {
            ticker: mention.ticker.clone(),
            sentiment: totals.sum / totals.count as f64,
            article_count: totals.count,
            updated_at: now,
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerTotals> {
        self.totals.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.totals.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_first_mention_creates_entry() {
        let mut state = AggregateState::new();
        let aggregate = state.apply(&TickerMention::new("AAPL", 0.4), at(1_700_000_000));

        assert_eq!(aggregate.ticker, "AAPL");
        assert_eq!(aggregate.article_count, 1);
        assert_eq!(aggregate.sentiment, 0.4);
        assert_eq!(aggregate.updated_at, at(1_700_000_000));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_running_average_two_mentions() {
        // TSLA 0.5 then -0.1 → count 2, average 0.2
        let mut state = AggregateState::new();
        state.apply(&TickerMention::new("TSLA", 0.5), at(1));
        let aggregate = state.apply(&TickerMention::new("TSLA", -0.1), at(2));

        assert_eq!(aggregate.article_count, 2);
        assert!((aggregate.sentiment - 0.2).abs() < 1e-12);
        assert_eq!(aggregate.updated_at, at(2));
    }

    #[test]
    fn test_tickers_are_independent() {
        let mut state = AggregateState::new();
        state.apply(&TickerMention::new("AAPL", 1.0), at(1));
        state.apply(&TickerMention::new("GOOG", -1.0), at(1));
        state.apply(&TickerMention::new("AAPL", 0.0), at(2));

        assert_eq!(state.get("AAPL").unwrap().count, 2);
        assert_eq!(state.get("GOOG").unwrap().count, 1);
        assert_eq!(state.get("GOOG").unwrap().average(), Some(-1.0));
        assert!(state.get("TSLA").is_none());
    }

    proptest! {
        #[test]
        fn prop_count_and_average_consistent(scores in proptest::collection::vec(-1.0f64..=1.0, 1..200)) {
            let mut state = AggregateState::new();
            let mut sum = 0.0;
            let mut last_count = 0;

            for (i, score) in scores.iter().enumerate() {
                let aggregate = state.apply(&TickerMention::new("AAPL", *score), at(i as i64));
                sum += score;

                prop_assert_eq!(aggregate.article_count, last_count + 1);
                prop_assert!((aggregate.sentiment - sum / aggregate.article_count as f64).abs() < 1e-9);
                last_count = aggregate.article_count;
            }

            prop_assert_eq!(state.get("AAPL").unwrap().count, scores.len() as u64);
        }

        #[test]
        fn prop_only_mentioned_tickers_change(mentions in proptest::collection::vec((0usize..3, -1.0f64..=1.0), 0..100)) {
            let tickers = ["AAPL", "TSLA", "GOOG"];
            let mut state = AggregateState::new();

            for (idx, score) in &mentions {
                state.apply(&TickerMention::new(tickers[*idx], *score), at(0));
            }

            for (idx, ticker) in tickers.iter().enumerate() {
                let expected = mentions.iter().filter(|(i, _)| *i == idx).count() as u64;
                let actual = state.get(ticker).map(|t| t.count).unwrap_or(0);
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
