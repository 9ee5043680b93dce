// tests/pipeline_flow.rs
// End-to-end pipeline behavior against scripted fakes: match/classify/
// deliver flow, per-item failure isolation, reconnect-with-resume, dedup,
// and shutdown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use mention_alerter::alert::Alert;
use mention_alerter::classify::{ClassificationResult, Classifier, ClassifyError};
use mention_alerter::feed::{ContentItem, FeedSource, FeedStream, StreamError};
use mention_alerter::matcher::KeywordMatcher;
use mention_alerter::notify::{Notifier, NotifyError};
use mention_alerter::pipeline::{FatalError, Pipeline, PipelineConfig};

// ---------- scripted feed ----------

type Event = Result<ContentItem, StreamError>;

enum ConnectOutcome {
    Fail(StreamError),
    Stream(Vec<Event>),
}

struct ScriptedSource {
    outcomes: Mutex<VecDeque<ConnectOutcome>>,
    /// Cursor passed to each connect call, in order.
    connects: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    fn new(outcomes: Vec<ConnectOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            connects: Mutex::new(Vec::new()),
        }
    }

    fn connect_cursors(&self) -> Vec<Option<String>> {
        self.connects.lock().clone()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn connect(&self, cursor: Option<String>) -> Result<Box<dyn FeedStream>, StreamError> {
        self.connects.lock().push(cursor.clone());
        match self.outcomes.lock().pop_front() {
            Some(ConnectOutcome::Fail(e)) => Err(e),
            Some(ConnectOutcome::Stream(events)) => Ok(Box::new(ScriptedStream {
                events: events.into(),
                cursor,
            })),
            // Script exhausted: end the run deterministically.
            None => Err(StreamError::Auth("script exhausted".into())),
        }
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

struct ScriptedStream {
    events: VecDeque<Event>,
    cursor: Option<String>,
}

#[async_trait]
impl FeedStream for ScriptedStream {
    async fn next(&mut self) -> Result<ContentItem, StreamError> {
        match self.events.pop_front() {
            Some(Ok(item)) => {
                self.cursor = Some(item.cursor.clone());
                Ok(item)
            }
            Some(Err(e)) => Err(e),
            None => Err(StreamError::Transient("stream script done".into())),
        }
    }

    fn cursor(&self) -> Option<String> {
        self.cursor.clone()
    }
}

// ---------- fake classifier ----------

struct FakeClassifier {
    /// Item bodies containing this marker fail classification.
    fail_marker: Option<String>,
    inputs: Mutex<Vec<String>>,
}

impl FakeClassifier {
    fn ok() -> Self {
        Self {
            fail_marker: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        self.inputs.lock().push(text.to_string());
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker) {
                return Err(ClassifyError("model unavailable".into()));
            }
        }
        Ok(ClassificationResult {
            label: "POSITIVE".into(),
            confidence: 0.9534,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

// ---------- fake notifier ----------

struct FakeNotifier {
    /// Alerts for these item ids fail delivery.
    fail_ids: Vec<String>,
    sent: Mutex<Vec<Alert>>,
    attempts: Mutex<Vec<String>>,
}

impl FakeNotifier {
    fn ok() -> Self {
        Self {
            fail_ids: Vec::new(),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::ok()
        }
    }

    fn sent_ids(&self) -> Vec<String> {
        self.sent.lock().iter().map(|a| a.item_id.clone()).collect()
    }

    fn attempted_ids(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.attempts.lock().push(alert.item_id.clone());
        if self.fail_ids.contains(&alert.item_id) {
            return Err(NotifyError("channel_not_found".into()));
        }
        self.sent.lock().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

// ---------- helpers ----------

fn item(id: &str, body: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        body: body.to_string(),
        author: Some("tester".into()),
        group: "AskReddit".into(),
        permalink: format!("https://reddit.com/r/AskReddit/comments/x/y/{id}/"),
        cursor: format!("t1_{id}"),
        created: None,
    }
}

fn fast_cfg() -> PipelineConfig {
    PipelineConfig {
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(20),
        max_connect_attempts: 5,
        ..PipelineConfig::default()
    }
}

fn matcher() -> KeywordMatcher {
    KeywordMatcher::new(
        ["question", "people", "think", "what", "secret"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}

async fn run_to_end(
    source: Arc<ScriptedSource>,
    classifier: Arc<FakeClassifier>,
    notifier: Arc<FakeNotifier>,
    cfg: PipelineConfig,
) -> Result<(), FatalError> {
    let mut pipeline = Pipeline::new(source, matcher(), classifier, notifier, cfg);
    let (_tx, rx) = watch::channel(false);
    pipeline.run(rx).await
}

// ---------- tests ----------

#[tokio::test]
async fn matched_items_are_classified_formatted_and_delivered() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Ok(item("a1", "What do you think about this?")),
        Ok(item("a2", "nothing of interest here")),
    ])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let res = run_to_end(source.clone(), classifier, notifier.clone(), fast_cfg()).await;
    assert!(matches!(res, Err(FatalError::Auth(_))));

    // First connect starts fresh (no cursor); only the matching item alerts.
    assert_eq!(source.connect_cursors()[0], None);
    assert_eq!(notifier.sent_ids(), vec!["a1"]);

    let sent = notifier.sent.lock();
    let text = &sent[0].text;
    // "think" is declared before "what", so it wins the tie-break.
    assert!(text.contains("*Keyword:* `think`"));
    assert!(text.contains("*Sentiment:* *Positive* (Confidence: 95.34%)"));
    assert!(text.contains("> What do you think about this?"));
}

#[tokio::test]
async fn classifier_input_is_truncated_but_alert_body_is_not() {
    let long_body = format!("what {}", "x".repeat(700));
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Ok(item("long1", &long_body)),
    ])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let _ = run_to_end(source, classifier.clone(), notifier.clone(), fast_cfg()).await;

    let inputs = classifier.inputs();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].chars().count(), 512);
    assert_eq!(inputs[0], long_body.chars().take(512).collect::<String>());

    // The alert still carries the whole body.
    assert!(notifier.sent.lock()[0].text.contains(&long_body));
}

#[tokio::test]
async fn classify_failure_drops_that_alert_and_continues() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Ok(item("x1", "what is broken here")),
        Ok(item("y1", "what comes next")),
    ])]));
    let classifier = Arc::new(FakeClassifier::failing_on("broken"));
    let notifier = Arc::new(FakeNotifier::ok());

    let _ = run_to_end(source, classifier, notifier.clone(), fast_cfg()).await;

    // No alert for x1; y1 processed normally afterwards.
    assert_eq!(notifier.sent_ids(), vec!["y1"]);
}

#[tokio::test]
async fn notify_failure_is_terminal_for_that_alert_only() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Ok(item("n1", "what now")),
        Ok(item("n2", "what then")),
    ])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::failing_on(&["n1"]));

    let _ = run_to_end(source, classifier, notifier.clone(), fast_cfg()).await;

    // One attempt per alert, no retry for n1, n2 still delivered.
    assert_eq!(notifier.attempted_ids(), vec!["n1", "n2"]);
    assert_eq!(notifier.sent_ids(), vec!["n2"]);
}

#[tokio::test]
async fn transient_failures_reconnect_and_resume_from_cursor() {
    let source = Arc::new(ScriptedSource::new(vec![
        ConnectOutcome::Stream(vec![
            Ok(item("r1", "what a day")),
            Ok(item("r2", "so they think")),
            Err(StreamError::Transient("connection reset".into())),
        ]),
        ConnectOutcome::Fail(StreamError::Transient("still down".into())),
        ConnectOutcome::Fail(StreamError::Transient("still down".into())),
        ConnectOutcome::Fail(StreamError::Transient("still down".into())),
        ConnectOutcome::Stream(vec![Ok(item("r3", "what happened while we were away"))]),
    ]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let _ = run_to_end(source.clone(), classifier, notifier.clone(), fast_cfg()).await;

    // Each item delivered exactly once, in order; nothing replayed.
    assert_eq!(notifier.sent_ids(), vec!["r1", "r2", "r3"]);

    // Reconnects resume from the last yielded cursor, not from scratch.
    let cursors = source.connect_cursors();
    assert_eq!(cursors[0], None);
    for c in &cursors[1..5] {
        assert_eq!(c.as_deref(), Some("t1_r2"));
    }
}

#[tokio::test]
async fn rate_limit_waits_without_reconnecting() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Err(StreamError::RateLimited {
            retry_after: Some(Duration::from_millis(2)),
        }),
        Ok(item("rl1", "what gives")),
    ])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let _ = run_to_end(source.clone(), classifier, notifier.clone(), fast_cfg()).await;

    assert_eq!(notifier.sent_ids(), vec!["rl1"]);
    // The rate limit alone never tears the connection down: the second
    // connect comes only from the script running out afterwards.
    assert_eq!(source.connect_cursors().len(), 2);
}

#[tokio::test]
async fn replayed_item_id_is_delivered_once() {
    let dup = item("d1", "what a secret");
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![
        Ok(dup.clone()),
        Ok(dup),
    ])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let _ = run_to_end(source, classifier, notifier.clone(), fast_cfg()).await;

    assert_eq!(notifier.sent_ids(), vec!["d1"]);
}

#[tokio::test]
async fn auth_failure_on_connect_is_fatal() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Fail(
        StreamError::Auth("invalid_grant".into()),
    )]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let res = run_to_end(source.clone(), classifier, notifier, fast_cfg()).await;
    match res {
        Err(FatalError::Auth(msg)) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected auth fatal, got {other:?}"),
    }
    // No retry after a credential failure.
    assert_eq!(source.connect_cursors().len(), 1);
}

#[tokio::test]
async fn reconnect_ceiling_is_fatal() {
    let outcomes = (0..10)
        .map(|_| ConnectOutcome::Fail(StreamError::Transient("down".into())))
        .collect();
    let source = Arc::new(ScriptedSource::new(outcomes));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());

    let cfg = PipelineConfig {
        max_connect_attempts: 3,
        ..fast_cfg()
    };
    let res = run_to_end(source.clone(), classifier, notifier, cfg).await;
    match res {
        Err(FatalError::ReconnectCeiling { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected reconnect ceiling, got {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_signal_stops_the_run_cleanly() {
    let source = Arc::new(ScriptedSource::new(vec![ConnectOutcome::Stream(vec![])]));
    let classifier = Arc::new(FakeClassifier::ok());
    let notifier = Arc::new(FakeNotifier::ok());
    let mut pipeline = Pipeline::new(source, matcher(), classifier, notifier, fast_cfg());

    let (tx, rx) = watch::channel(true);
    let res = pipeline.run(rx).await;
    drop(tx);
    assert!(res.is_ok());
}
