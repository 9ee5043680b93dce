// src/config.rs
//! Startup configuration: secrets come from the environment, the monitored
//! keyword/group lists come from a static config file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_MONITOR_PATH: &str = "MONITOR_CONFIG_PATH";

const REQUIRED_ENV: [&str; 7] = [
    "FEED_CLIENT_ID",
    "FEED_CLIENT_SECRET",
    "FEED_USER_AGENT",
    "FEED_USERNAME",
    "FEED_PASSWORD",
    "NOTIFY_CHANNEL",
    "NOTIFY_TOKEN",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),
    #[error("reading monitor config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("monitor config {path} is neither valid TOML nor JSON")]
    Unparseable { path: PathBuf },
    #[error("monitor config has an empty keyword list")]
    NoKeywords,
}

/// Secrets required to reach the feed source and the messaging platform.
/// Validated in one pass so the operator sees every missing name at once.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub feed_client_id: String,
    pub feed_client_secret: String,
    pub feed_user_agent: String,
    pub feed_username: String,
    pub feed_password: String,
    pub notify_channel: String,
    pub notify_token: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut get = |name: &str| -> String {
            match std::env::var(name) {
                Ok(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let secrets = Self {
            feed_client_id: get("FEED_CLIENT_ID"),
            feed_client_secret: get("FEED_CLIENT_SECRET"),
            feed_user_agent: get("FEED_USER_AGENT"),
            feed_username: get("FEED_USERNAME"),
            feed_password: get("FEED_PASSWORD"),
            notify_channel: get("NOTIFY_CHANNEL"),
            notify_token: get("NOTIFY_TOKEN"),
        };

        if missing.is_empty() {
            Ok(secrets)
        } else {
            Err(ConfigError::MissingEnv(missing))
        }
    }

    pub fn required_names() -> &'static [&'static str] {
        &REQUIRED_ENV
    }
}

/// Static (non-secret) monitor configuration: which groups to watch and
/// which keywords to match, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub keywords: Vec<String>,
    pub groups: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keywords: [
                "question", "people", "think", "what", "like", "would", "story",
                "time", "life", "secret",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            groups: ["AskReddit", "funny", "gaming", "worldnews", "memes"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MonitorFile {
    keywords: Vec<String>,
    groups: Vec<String>,
}

impl MonitorConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parsed = parse_monitor(&content, &ext).ok_or_else(|| ConfigError::Unparseable {
            path: path.to_path_buf(),
        })?;
        Self::from_file(parsed)
    }

    /// Load using env var + fallbacks:
    /// 1) $MONITOR_CONFIG_PATH
    /// 2) config/monitor.toml
    /// 3) config/monitor.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_MONITOR_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        for candidate in ["config/monitor.toml", "config/monitor.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default())
    }

    fn from_file(f: MonitorFile) -> Result<Self, ConfigError> {
        // Keywords are matched case-insensitively; store them lowercase.
        // Order is the tie-break for multi-keyword matches, so dedup keeps
        // the first occurrence rather than sorting.
        let keywords = dedup_in_order(
            f.keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        if keywords.is_empty() {
            return Err(ConfigError::NoKeywords);
        }
        let groups = dedup_in_order(
            f.groups
                .into_iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
        );
        Ok(Self { keywords, groups })
    }
}

fn dedup_in_order<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for it in items {
        if seen.insert(it.clone()) {
            out.push(it);
        }
    }
    out
}

fn parse_monitor(s: &str, hint_ext: &str) -> Option<MonitorFile> {
    let try_toml = hint_ext == "toml" || s.contains("keywords =");
    if try_toml {
        if let Ok(v) = toml::from_str::<MonitorFile>(s) {
            return Some(v);
        }
    }
    if let Ok(v) = serde_json::from_str::<MonitorFile>(s) {
        return Some(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str::<MonitorFile>(s) {
            return Some(v);
        }
    }
    None
}

/// Tunables with environment overrides; defaults match the shipped behavior.
#[derive(Debug, Clone)]
pub struct Tunables {
    /// Characters submitted to the classifier (alert bodies stay untruncated).
    pub classify_max_len: usize,
    /// Delay between feed listing polls.
    pub poll_interval: Duration,
    /// Prometheus exporter bind address; disabled when unset.
    pub metrics_addr: Option<std::net::SocketAddr>,
}

impl Tunables {
    pub fn from_env() -> Self {
        let classify_max_len = std::env::var("CLASSIFY_MAX_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(512);
        let poll_secs: u64 = std::env::var("FEED_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let metrics_addr = std::env::var("METRICS_ADDR")
            .ok()
            .and_then(|v| v.parse().ok());
        Self {
            classify_max_len,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            metrics_addr,
        }
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            classify_max_len: 512,
            poll_interval: Duration::from_secs(2),
            metrics_addr: None,
        }
    }
}
