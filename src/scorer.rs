//! Sentiment scoring capability
//!
//! The pipeline only depends on [`SentimentScorer`]: text in, polarity in
//! [-1, 1] out, deterministic for identical input. Failures are per-article
//! and never fatal. [`LexiconScorer`] is the built-in implementation; any
//! `Fn(&str) -> Result<f64, ScoreError>` closure is also a scorer.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("Nothing to score")]
    EmptyText,

    #[error("Scorer produced a non-finite polarity ({0})")]
    NonFinite(f64),

    #[error("Scorer failed: {0}")]
    Failed(String),
}

pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> Result<f64, ScoreError>;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> Result<f64, ScoreError> + Send + Sync,
{
    fn score(&self, text: &str) -> Result<f64, ScoreError> {
        self(text)
    }
}

/// Score through any scorer, enforcing the [-1, 1] contract
pub fn bounded_score(scorer: &dyn SentimentScorer, text: &str) -> Result<f64, ScoreError> {
    let score = scorer.score(text)?;
    if !score.is_finite() {
        return Err(ScoreError::NonFinite(score));
    }
    Ok(score.clamp(-1.0, 1.0))
}

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "isn't", "wasn't", "don't", "doesn't", "didn't", "won't", "can't"];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("extremely", 1.5),
    ("sharply", 1.4),
    ("strongly", 1.3),
    ("slightly", 0.6),
    ("somewhat", 0.7),
];

const POLARITIES: &[(&str, f64)] = &[
    // Positive
    ("surge", 0.6), ("surges", 0.6), ("surged", 0.6),
    ("soar", 0.7), ("soars", 0.7), ("soared", 0.7),
    ("rally", 0.5), ("rallies", 0.5), ("rallied", 0.5),
    ("gain", 0.4), ("gains", 0.4), ("gained", 0.4),
    ("jump", 0.5), ("jumps", 0.5), ("jumped", 0.5),
    ("rise", 0.3), ("rises", 0.3), ("rose", 0.3),
    ("up", 0.2), ("higher", 0.3), ("high", 0.16),
    ("beat", 0.5), ("beats", 0.5), ("record", 0.3),
    ("strong", 0.43), ("growth", 0.4), ("profit", 0.4), ("profitable", 0.5),
    ("bullish", 0.7), ("upgrade", 0.5), ("upgraded", 0.5), ("outperform", 0.5),
    ("positive", 0.23), ("good", 0.7), ("great", 0.8), ("excellent", 1.0),
    ("success", 0.3), ("successful", 0.75), ("optimistic", 0.5), ("boost", 0.4),
    ("innovative", 0.5), ("breakthrough", 0.6),
    // Negative
    ("fall", -0.4), ("falls", -0.4), ("fell", -0.4),
    ("drop", -0.4), ("drops", -0.4), ("dropped", -0.4),
    ("plunge", -0.7), ("plunges", -0.7), ("plunged", -0.7),
    ("crash", -0.8), ("crashes", -0.8), ("crashed", -0.8),
    ("slump", -0.6), ("slumps", -0.6), ("decline", -0.4), ("declines", -0.4),
    ("down", -0.16), ("lower", -0.3), ("low", -0.2),
    ("loss", -0.5), ("losses", -0.5), ("miss", -0.4), ("misses", -0.4), ("missed", -0.4),
    ("weak", -0.4), ("bearish", -0.7), ("downgrade", -0.5), ("downgraded", -0.5),
    ("lawsuit", -0.5), ("recall", -0.4), ("probe", -0.3), ("fraud", -0.8),
    ("negative", -0.3), ("bad", -0.7), ("poor", -0.4), ("terrible", -1.0),
    ("fear", -0.5), ("fears", -0.5), ("risk", -0.2), ("layoffs", -0.5), ("warning", -0.4),
];

/// Lexicon scorer: averages word polarities over the words it knows.
///
/// A negation flips and halves the next polar word; an intensifier scales it.
/// Text with no known words scores 0.0.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<String, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self::with_lexicon(POLARITIES.iter().map(|(w, p)| (w.to_string(), *p)))
    }

    pub fn with_lexicon(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            lexicon: entries
                .into_iter()
                .map(|(word, polarity)| (word.to_lowercase(), polarity))
                .collect(),
        }
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .map(|t| t.trim_matches('\'').to_lowercase())
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Result<f64, ScoreError> {
        if text.trim().is_empty() {
            return Err(ScoreError::EmptyText);
        }

        let mut total = 0.0;
        let mut hits = 0u32;
        let mut negate = false;
        let mut intensity = 1.0;

        for token in Self::tokens(text) {
            if NEGATIONS.contains(&token.as_str()) || token.ends_with("n't") {
                negate = true;
                continue;
            }
            if let Some((_, factor)) = INTENSIFIERS.iter().find(|(w, _)| *w == token) {
                intensity *= factor;
                continue;
            }

            if let Some(polarity) = self.lexicon.get(&token) {
                let mut value = polarity * intensity;
                if negate {
                    value *= -0.5;
                }
                total += value;
                hits += 1;
            }
            negate = false;
            intensity = 1.0;
        }

        if hits == 0 {
            return Ok(0.0);
        }
        Ok((total / hits as f64).clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_and_negative_headlines() {
        let scorer = LexiconScorer::new();

        let up = scorer.score("AAPL surges. Apple stock up").unwrap();
        assert!(up > 0.0, "expected positive, got {}", up);

        let down = scorer.score("TSLA plunges after recall").unwrap();
        assert!(down < 0.0, "expected negative, got {}", down);
    }

    #[test]
    fn test_unknown_words_score_neutral() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.score("Nothing relevant. no mention").unwrap(), 0.0);
    }

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = LexiconScorer::new();
        let plain = scorer.score("results were good").unwrap();
        let negated = scorer.score("results were not good").unwrap();
        assert!(plain > 0.0);
        assert!(negated < 0.0);
        assert!((negated + plain * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_deterministic_and_bounded() {
        let scorer = LexiconScorer::new();
        let text = "extremely excellent excellent quarter";
        let first = scorer.score(text).unwrap();
        assert_eq!(first, scorer.score(text).unwrap());
        assert!((-1.0..=1.0).contains(&first));
    }

    #[test]
    fn test_empty_text_is_error() {
        assert_eq!(LexiconScorer::new().score("  "), Err(ScoreError::EmptyText));
    }

    #[test]
    fn test_bounded_score_clamps_and_rejects_nan() {
        let too_high = |_: &str| -> Result<f64, ScoreError> { Ok(3.5) };
        assert_eq!(bounded_score(&too_high, "x"), Ok(1.0));

        let nan = |_: &str| -> Result<f64, ScoreError> { Ok(f64::NAN) };
        assert!(matches!(bounded_score(&nan, "x"), Err(ScoreError::NonFinite(_))));
    }
}
