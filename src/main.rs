//! Keyword mention alerter — binary entrypoint.
//! Validates configuration, wires the feed source, classifier, and notifier
//! into the pipeline, and runs until ctrl-c or a fatal feed error.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mention_alerter::classify::lexicon::LexiconClassifier;
use mention_alerter::classify::Classifier;
use mention_alerter::config::{MonitorConfig, Secrets, Tunables};
use mention_alerter::feed::reddit::RedditFeedSource;
use mention_alerter::feed::FeedSource;
use mention_alerter::matcher::KeywordMatcher;
use mention_alerter::notify::slack::SlackNotifier;
use mention_alerter::pipeline::{Pipeline, PipelineConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mention_alerter=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let secrets = match Secrets::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let monitor = match MonitorConfig::load_default() {
        Ok(m) => m,
        Err(e) => {
            error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let tunables = Tunables::from_env();

    if let Some(addr) = tunables.metrics_addr {
        if let Err(e) = mention_alerter::metrics::install_exporter(addr) {
            error!("metrics exporter failed to start: {e}");
            return ExitCode::FAILURE;
        }
        info!(%addr, "metrics exporter listening");
    }

    let source = Arc::new(RedditFeedSource::new(
        &secrets,
        &monitor.groups,
        tunables.poll_interval,
    ));
    let matcher = KeywordMatcher::new(monitor.keywords.clone());
    let classifier = Arc::new(LexiconClassifier::new());
    let notifier = Arc::new(SlackNotifier::new(
        secrets.notify_token.clone(),
        secrets.notify_channel.clone(),
    ));

    info!(classifier = classifier.name(), "classifier ready");
    info!(
        feed = %source.describe(),
        keywords = %monitor.keywords.join(", "),
        "starting monitor"
    );

    let cfg = PipelineConfig {
        classify_max_len: tunables.classify_max_len,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(source, matcher, classifier, notifier, cfg);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    match pipeline.run(shutdown_rx).await {
        Ok(()) => {
            info!("stopped cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
