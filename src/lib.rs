// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod alert;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod feed;
pub mod matcher;
pub mod metrics;
pub mod notify;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::alert::{format_alert, Alert};
pub use crate::classify::{ClassificationResult, Classifier, ClassifyError};
pub use crate::feed::{ContentItem, FeedSource, FeedStream, StreamError};
pub use crate::matcher::KeywordMatcher;
pub use crate::notify::{Notifier, NotifyError};
pub use crate::pipeline::{FatalError, Pipeline, PipelineConfig};
