// src/feed/mod.rs
//! Feed-source seam: an unbounded, at-least-once stream of content items
//! with an opaque resume cursor.

pub mod reddit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One unit of monitored content from the feed. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentItem {
    /// Source-unique identifier, e.g. a comment id.
    pub id: String,
    /// Full body text; unbounded, truncated only for classification input.
    pub body: String,
    /// Absent when the author deleted their account or is anonymized.
    pub author: Option<String>,
    /// Which monitored group the item came from.
    pub group: String,
    /// Fully-qualified permalink to the item.
    pub permalink: String,
    /// Source-native resume token (cursor position of this item).
    pub cursor: String,
    /// When the source says the item was created; absent if unreported.
    pub created: Option<DateTime<Utc>>,
}

/// Failure surface of a stream read. Only `Auth` is fatal to the process;
/// the pipeline reconnects on the rest.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("feed authentication failed: {0}")]
    Auth(String),
    #[error("feed rate limited{}", .retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited {
        retry_after: Option<std::time::Duration>,
    },
    #[error("feed stream interrupted: {0}")]
    Transient(String),
}

impl StreamError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::Auth(_))
    }
}

/// A live connection to the feed. Yields items strictly after the cursor it
/// was opened with; its own cursor advances as items are yielded.
#[async_trait]
pub trait FeedStream: Send {
    /// Next item, blocking until one arrives or the stream fails.
    async fn next(&mut self) -> Result<ContentItem, StreamError>;

    /// Last successfully observed position, for resume after reconnect.
    fn cursor(&self) -> Option<String>;
}

/// Factory for [`FeedStream`] connections. `connect(None)` starts at
/// subscription time (backlog is skipped, never replayed); `connect(Some)`
/// resumes after the given cursor.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn connect(&self, cursor: Option<String>) -> Result<Box<dyn FeedStream>, StreamError>;

    /// Human-readable description for startup logs, e.g. the group list.
    fn describe(&self) -> String;
}
