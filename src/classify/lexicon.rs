// src/classify/lexicon.rs
//! Built-in lexicon classifier: embedded word-score dictionary with a short
//! negation window. No model download, no network; always available.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{ClassificationResult, Classifier, ClassifyError};

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

pub const LABEL_POSITIVE: &str = "POSITIVE";
pub const LABEL_NEGATIVE: &str = "NEGATIVE";
pub const LABEL_NEUTRAL: &str = "NEUTRAL";

#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (summed score, number of scoring tokens).
    /// A negator within the preceding 1..=3 tokens inverts a word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits: usize = 0;

        for i in 0..tokens.len() {
            let base = Self::word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
            hits += 1;
        }

        (score, hits)
    }
}

#[async_trait]
impl Classifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let (score, hits) = self.score_text(text);

        let label = match score.signum() {
            1 => LABEL_POSITIVE,
            -1 => LABEL_NEGATIVE,
            _ => LABEL_NEUTRAL,
        };

        // Confidence grows with evidence: base 0.55, plus a capped bonus per
        // scoring token and per point of absolute score, ceiling 0.95.
        let confidence = if hits == 0 {
            0.50
        } else {
            let hit_bonus = 0.05 * (hits.min(4) as f32);
            let strength_bonus = 0.04 * (score.unsigned_abs().min(5) as f32);
            (0.55 + hit_bonus + strength_bonus).min(0.95)
        };

        Ok(ClassificationResult {
            label: label.to_string(),
            confidence,
        })
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

// Contractions lose their apostrophe in `tokenize` ("isn't" -> "isn", "t"),
// so the stems stand in for the full forms. Plain "can"/"won" stay out: they
// are ordinary words far more often than halves of "can't"/"won't".
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "cannot" | "without" | "isn" | "wasn" | "aren" | "don" | "doesn"
            | "didn"
    )
}
