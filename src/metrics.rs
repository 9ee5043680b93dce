// src/metrics.rs
//! Optional Prometheus exposition. When `METRICS_ADDR` is set, the exporter
//! serves `/metrics` on its own listener; otherwise the counters are no-ops.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metric registration so series show up with help texts.
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Items yielded by the feed stream.");
        describe_counter!(
            "pipeline_duplicates_total",
            "Items suppressed by the recent-ID guard."
        );
        describe_counter!("pipeline_matches_total", "Items matching a keyword.");
        describe_counter!("alerts_sent_total", "Alerts delivered to the notifier.");
        describe_counter!(
            "classify_errors_total",
            "Per-item classification failures (alert dropped)."
        );
        describe_counter!(
            "notify_errors_total",
            "Per-alert delivery failures (alert dropped)."
        );
        describe_counter!("feed_reconnects_total", "Feed reconnect attempts.");
        describe_counter!("feed_items_total", "Items parsed from feed listings.");
        describe_counter!("feed_poll_errors_total", "Feed listing fetch errors.");
        describe_histogram!("feed_poll_ms", "Feed listing poll time in milliseconds.");
    });
}

/// Install the Prometheus recorder with a standalone HTTP listener.
pub fn install_exporter(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus exporter: {e}"))?;
    describe_all();
    Ok(())
}
