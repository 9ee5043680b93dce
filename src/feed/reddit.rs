// src/feed/reddit.rs
//! HTTP polling implementation of the feed seam against a Reddit-style API:
//! OAuth password-grant auth, then comment-listing polls driven by a
//! `before` cursor. The first page only primes the cursor, so backlog that
//! existed before subscription is never yielded.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::config::Secrets;
use crate::feed::{ContentItem, FeedSource, FeedStream, StreamError};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const LINK_BASE: &str = "https://reddit.com";

const PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct RedditFeedSource {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    groups: Vec<String>,
    poll_interval: Duration,
}

impl RedditFeedSource {
    pub fn new(secrets: &Secrets, groups: &[String], poll_interval: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(secrets.feed_user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            client_id: secrets.feed_client_id.clone(),
            client_secret: secrets.feed_client_secret.clone(),
            username: secrets.feed_username.clone(),
            password: secrets.feed_password.clone(),
            groups: groups.to_vec(),
            poll_interval,
        }
    }

    fn multi_group(&self) -> String {
        self.groups.join("+")
    }

    async fn fetch_token(&self) -> Result<String, StreamError> {
        let params = [
            ("grant_type", "password"),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| StreamError::Transient(format!("token request: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(StreamError::Auth(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(StreamError::Transient(format!(
                "token endpoint returned {status}"
            )));
        }

        let tok: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StreamError::Transient(format!("token body: {e}")))?;
        match tok {
            TokenResponse::Ok { access_token } => Ok(access_token),
            // invalid_grant means bad username/password; a credential
            // problem, not a network one.
            TokenResponse::Err { error } => Err(StreamError::Auth(format!("token error: {error}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Ok { access_token: String },
    Err { error: String },
}

#[async_trait]
impl FeedSource for RedditFeedSource {
    async fn connect(&self, cursor: Option<String>) -> Result<Box<dyn FeedStream>, StreamError> {
        let token = self.fetch_token().await?;
        let mut stream = RedditStream {
            http: self.http.clone(),
            token,
            listing_url: format!(
                "{API_BASE}/r/{}/comments?limit={PAGE_LIMIT}",
                self.multi_group()
            ),
            poll_interval: self.poll_interval,
            cursor,
            buffer: VecDeque::new(),
        };
        // Resuming from a cursor keeps the position from before the
        // interruption; a fresh start skips the existing backlog instead.
        if stream.cursor.is_none() {
            stream.prime().await?;
        }
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("r/{}", self.multi_group())
    }
}

struct RedditStream {
    http: reqwest::Client,
    token: String,
    listing_url: String,
    poll_interval: Duration,
    cursor: Option<String>,
    buffer: VecDeque<ContentItem>,
}

impl RedditStream {
    /// Establish the subscription-time cursor without yielding anything.
    async fn prime(&mut self) -> Result<(), StreamError> {
        let page = self.fetch_page(None).await?;
        // Listings arrive newest-first.
        self.cursor = page.first().map(|it| it.cursor.clone());
        Ok(())
    }

    async fn fetch_page(&self, before: Option<&str>) -> Result<Vec<ContentItem>, StreamError> {
        let url = match before {
            Some(c) => format!("{}&before={c}", self.listing_url),
            None => self.listing_url.clone(),
        };
        let t0 = std::time::Instant::now();
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                counter!("feed_poll_errors_total").increment(1);
                StreamError::Transient(format!("listing request: {e}"))
            })?;

        if let Err(e) = check_status(&resp) {
            counter!("feed_poll_errors_total").increment(1);
            return Err(e);
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StreamError::Transient(format!("listing body: {e}")))?;
        let items = parse_listing(&body, LINK_BASE)
            .map_err(|e| StreamError::Transient(format!("listing parse: {e}")))?;

        histogram!("feed_poll_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("feed_items_total").increment(items.len() as u64);
        Ok(items)
    }
}

fn check_status(resp: &reqwest::Response) -> Result<(), StreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    match status.as_u16() {
        // Token expiry shows up as 401 mid-stream; a reconnect re-auths,
        // so it is not a hard credential failure.
        401 => Err(StreamError::Transient("auth token expired".into())),
        403 => Err(StreamError::Auth("listing returned 403 Forbidden".into())),
        429 => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(StreamError::RateLimited { retry_after })
        }
        _ => Err(StreamError::Transient(format!("listing returned {status}"))),
    }
}

#[async_trait]
impl FeedStream for RedditStream {
    async fn next(&mut self) -> Result<ContentItem, StreamError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                // Cursor advances the moment an item is handed out; a crash
                // before delivery re-yields at most this one item.
                self.cursor = Some(item.cursor.clone());
                return Ok(item);
            }

            tokio::time::sleep(self.poll_interval).await;

            let mut page = self.fetch_page(self.cursor.as_deref()).await?;
            // Yield oldest-first so downstream sees feed order.
            page.reverse();
            self.buffer.extend(page);
        }
    }

    fn cursor(&self) -> Option<String> {
        self.cursor.clone()
    }
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    name: String,
    body: String,
    author: Option<String>,
    subreddit: String,
    permalink: String,
    created_utc: Option<f64>,
}

/// Pure listing-to-items mapping, kept free of I/O for fixture tests.
/// Returns items in listing order (newest first).
pub fn parse_listing(v: &serde_json::Value, link_base: &str) -> anyhow::Result<Vec<ContentItem>> {
    let children = v["data"]["children"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("listing without data.children"))?;

    let mut out = Vec::with_capacity(children.len());
    for child in children {
        let raw: RawComment = match serde_json::from_value(child["data"].clone()) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed listing child");
                continue;
            }
        };
        // Bodies arrive HTML-entity-escaped; decode once at the transport
        // boundary so matching and alerts see the text the author wrote.
        let body = html_escape::decode_html_entities(&raw.body).to_string();
        let author = raw
            .author
            .filter(|a| !a.is_empty() && a != "[deleted]");
        let created = raw
            .created_utc
            .and_then(|secs| chrono::DateTime::from_timestamp(secs as i64, 0));
        out.push(ContentItem {
            id: raw.id,
            body,
            author,
            group: raw.subreddit,
            permalink: format!("{link_base}{}", raw.permalink),
            cursor: raw.name,
            created,
        });
    }
    Ok(out)
}
