// src/matcher.rs
//! Ordered, case-insensitive keyword matching. First configured keyword
//! wins; an item containing several keywords is reported under the one
//! declared earliest.

/// Stateless predicate over a configured keyword list. Keywords are stored
/// lowercase in declaration order (see `MonitorConfig`).
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    /// First keyword contained in `text` (case-insensitive substring), in
    /// declaration order. Short-circuits on the first hit.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .find(|kw| haystack.contains(kw.as_str()))
            .map(|kw| kw.as_str())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}
