// src/alert.rs
//! Alert composition: a fully rendered, deterministic markdown message per
//! matched item. No timestamps or randomness in the body, so identical
//! inputs render byte-identical output (golden-testable).

use crate::classify::ClassificationResult;
use crate::feed::ContentItem;

/// Placeholder rendered when the author is absent (deleted/anonymized).
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A rendered alert, ready for a single delivery attempt sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Identifier of the item this alert was built from, for logs.
    pub item_id: String,
    /// Full markdown message body.
    pub text: String,
}

/// Compose the alert body. Field order is fixed: keyword, group, author,
/// sentiment, full (untruncated) body, permalink.
pub fn format_alert(
    item: &ContentItem,
    keyword: &str,
    classification: &ClassificationResult,
) -> Alert {
    let author = item.author.as_deref().unwrap_or(DELETED_AUTHOR);
    let text = format!(
        "*New Mention Alert!*\n\n\
         *Keyword:* `{keyword}`\n\
         *Group:* `{group}`\n\
         *Author:* `{author}`\n\
         *Sentiment:* {sentiment}\n\n\
         > {body}\n\n\
         *Link:* {permalink}",
        group = item.group,
        sentiment = render_sentiment(classification),
        body = item.body,
        permalink = item.permalink,
    );
    Alert {
        item_id: item.id.clone(),
        text,
    }
}

/// `*Positive* (Confidence: 95.34%)` — label capitalized, confidence as a
/// percentage with two decimals.
pub fn render_sentiment(c: &ClassificationResult) -> String {
    format!(
        "*{}* (Confidence: {:.2}%)",
        capitalize(&c.label),
        c.confidence * 100.0
    )
}

/// First letter uppercase, rest lowercase ("POSITIVE" -> "Positive").
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
