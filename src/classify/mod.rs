// src/classify/mod.rs
//! Sentiment classifier seam. The pipeline truncates input before
//! submission; implementations never see more than `max_len` characters.

pub mod lexicon;

use async_trait::async_trait;

/// Label plus confidence in [0.0, 1.0]. The label set is classifier-
/// dependent (the built-in lexicon classifier emits POSITIVE / NEGATIVE /
/// NEUTRAL); rendering capitalizes it for humans.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, thiserror::Error)]
#[error("classification failed: {0}")]
pub struct ClassifyError(pub String);

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError>;

    /// Name for startup/diagnostic logs.
    fn name(&self) -> &'static str;
}

/// Truncate to at most `max_len` characters (not bytes), preserving the
/// original on short input. Downstream models may reject or mis-score
/// longer inputs, so this is a hard contract for classifier submission.
pub fn truncate_chars(text: &str, max_len: usize) -> &str {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
