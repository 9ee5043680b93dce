// src/notify/slack.rs
//! Slack Web API notifier (`chat.postMessage`). Slack reports most failures
//! as HTTP 200 with `ok: false`, so both the status and the response
//! envelope are checked.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{Notifier, NotifyError};
use crate::alert::Alert;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

pub struct SlackNotifier {
    client: Client,
    token: String,
    channel: String,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(token: String, channel: String) -> Self {
        Self {
            client: Client::new(),
            token,
            channel,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "channel": self.channel,
            "text": alert.text,
            "mrkdwn": true,
        });

        let resp = self
            .client
            .post(POST_MESSAGE_URL)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError(format!("slack request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError(format!("slack returned {status}")));
        }

        let parsed: SlackResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError(format!("slack response body: {e}")))?;
        if !parsed.ok {
            return Err(NotifyError(format!(
                "slack api error: {}",
                parsed.error.unwrap_or_else(|| "unknown".into())
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
