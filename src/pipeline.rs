// src/pipeline.rs
//! Orchestrator: drives the feed stream through match -> classify ->
//! format -> deliver, isolating per-item failures so a single bad item or
//! flaky dependency never stops the stream. Stream interruptions reconnect
//! with bounded exponential backoff; only auth failures (or exhausting the
//! backoff ceiling) are fatal.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::alert::format_alert;
use crate::classify::{truncate_chars, Classifier};
use crate::dedup::RecentIds;
use crate::feed::{ContentItem, FeedSource, FeedStream, StreamError};
use crate::matcher::KeywordMatcher;
use crate::notify::Notifier;

/// Errors that cross the top-level boundary and terminate the process.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("feed authentication failed: {0}")]
    Auth(String),
    #[error("gave up reconnecting after {attempts} attempts: {last}")]
    ReconnectCeiling { attempts: u32, last: String },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Characters submitted to the classifier per item.
    pub classify_max_len: usize,
    /// Consecutive failed connects tolerated before going fatal.
    pub max_connect_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Recent-ID window suppressing duplicate deliveries within a run.
    pub dedup_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classify_max_len: 512,
            max_connect_attempts: 8,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(60),
            dedup_capacity: 4096,
        }
    }
}

/// Bounded exponential backoff: base << (attempt-1), capped. Attempts are
/// 1-based; attempt 0 behaves like attempt 1.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let ms = (base.as_millis() as u64).saturating_mul(1u64 << shift);
    Duration::from_millis(ms).min(cap)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Listening,
}

pub struct Pipeline {
    source: Arc<dyn FeedSource>,
    matcher: KeywordMatcher,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn Notifier>,
    cfg: PipelineConfig,
    recent: RecentIds,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FeedSource>,
        matcher: KeywordMatcher,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        cfg: PipelineConfig,
    ) -> Self {
        let recent = RecentIds::new(cfg.dedup_capacity);
        Self {
            source,
            matcher,
            classifier,
            notifier,
            cfg,
            recent,
        }
    }

    /// Run until `shutdown` flips to true (graceful, returns Ok) or a fatal
    /// error occurs. The in-flight item finishes before a shutdown exit.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), FatalError> {
        let mut state = State::Connecting;
        let mut stream: Option<Box<dyn FeedStream>> = None;
        let mut cursor: Option<String> = None;
        let mut connect_attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping pipeline");
                return Ok(());
            }

            match state {
                State::Connecting => {
                    match self.source.connect(cursor.clone()).await {
                        Ok(s) => {
                            connect_attempts = 0;
                            stream = Some(s);
                            state = State::Listening;
                            info!(feed = %self.source.describe(), "listening for new items");
                        }
                        Err(e) if e.is_fatal() => {
                            return Err(FatalError::Auth(e.to_string()));
                        }
                        Err(e) => {
                            connect_attempts += 1;
                            counter!("feed_reconnects_total").increment(1);
                            if connect_attempts > self.cfg.max_connect_attempts {
                                return Err(FatalError::ReconnectCeiling {
                                    attempts: connect_attempts,
                                    last: e.to_string(),
                                });
                            }
                            let delay = self.wait_before_retry(&e, connect_attempts);
                            warn!(
                                attempt = connect_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "feed connect failed, backing off"
                            );
                            sleep_or_shutdown(delay, &mut shutdown).await;
                        }
                    }
                }
                State::Listening => {
                    let s = stream.as_mut().expect("stream present while listening");
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                info!("shutdown requested, stopping pipeline");
                                return Ok(());
                            }
                        }
                        next = s.next() => match next {
                            Ok(item) => self.handle_item(item).await,
                            Err(e) if e.is_fatal() => {
                                return Err(FatalError::Auth(e.to_string()));
                            }
                            Err(StreamError::RateLimited { retry_after }) => {
                                // The connection is fine; wait out the limit
                                // before the next read. Not a reconnect.
                                let delay = retry_after
                                    .unwrap_or(self.cfg.backoff_base)
                                    .min(self.cfg.backoff_cap);
                                warn!(delay_ms = delay.as_millis() as u64, "feed rate limited");
                                sleep_or_shutdown(delay, &mut shutdown).await;
                            }
                            Err(e) => {
                                cursor = s.cursor();
                                stream = None;
                                state = State::Connecting;
                                warn!(error = %e, cursor = ?cursor, "stream interrupted, reconnecting");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Per-item stages. Never returns an error: classify and notify
    /// failures are logged and the item's alert is dropped.
    async fn handle_item(&mut self, item: ContentItem) {
        counter!("pipeline_items_total").increment(1);

        if !self.recent.insert(&item.id) {
            debug!(item = %item.id, "duplicate item suppressed");
            counter!("pipeline_duplicates_total").increment(1);
            return;
        }

        // Matching: pure, no failure path.
        let Some(keyword) = self.matcher.first_match(&item.body) else {
            return;
        };
        let keyword = keyword.to_string();
        info!(item = %item.id, keyword = %keyword, group = %item.group, "keyword match");
        counter!("pipeline_matches_total").increment(1);

        // Classifying: input truncated per contract, body stays whole.
        let snippet = truncate_chars(&item.body, self.cfg.classify_max_len);
        let classification = match self.classifier.classify(snippet).await {
            Ok(c) => c,
            Err(e) => {
                warn!(item = %item.id, error = %e, "classification failed, alert dropped");
                counter!("classify_errors_total").increment(1);
                return;
            }
        };

        // Formatting + Delivering: one attempt per alert.
        let alert = format_alert(&item, &keyword, &classification);
        match self.notifier.send(&alert).await {
            Ok(()) => {
                info!(item = %alert.item_id, "alert delivered");
                counter!("alerts_sent_total").increment(1);
            }
            Err(e) => {
                warn!(item = %alert.item_id, error = %e, "delivery failed, alert dropped");
                counter!("notify_errors_total").increment(1);
            }
        }
    }

    fn wait_before_retry(&self, err: &StreamError, attempt: u32) -> Duration {
        let backoff = backoff_delay(attempt, self.cfg.backoff_base, self.cfg.backoff_cap);
        match err {
            StreamError::RateLimited {
                retry_after: Some(ra),
            } => (*ra).max(backoff).min(self.cfg.backoff_cap),
            _ => backoff,
        }
    }
}

async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = shutdown.changed() => {}
    }
}
