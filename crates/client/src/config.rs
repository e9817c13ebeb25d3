use std::str::FromStr;
use std::time::Duration;

use crate::backoff::PollConfig;
use crate::error::{ClientError, ClientResult};

const DEFAULT_URL: &str = "http://localhost:3000";

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Gateway root, e.g. `http://localhost:3000`. No trailing slash.
    pub base_url: String,
    /// Timeout of each individual HTTP request.
    pub timeout: Duration,
    /// Interval schedule of [`poll_run`](crate::GatewayClient::poll_run).
    pub poll: PollConfig,
    /// Retries of a call that failed in transport, after the first attempt.
    pub max_transport_retries: u32,
    /// Delay schedule between transport retries.
    pub retry: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            poll: PollConfig::default(),
            max_transport_retries: 3,
            retry: PollConfig::transport_retry(),
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `FLOWGATE_URL`             | `http://localhost:3000` |
    /// | `FLOWGATE_TIMEOUT_SECS`    | `30`                    |
    /// | `FLOWGATE_MAX_RETRIES`     | `3`                     |
    ///
    /// A malformed value is reported as [`ClientError::Config`].
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let base_url = lookup("FLOWGATE_URL").unwrap_or_else(|| DEFAULT_URL.into());
        let timeout_secs: u64 = parse_var(&lookup, "FLOWGATE_TIMEOUT_SECS", 30)?;
        let max_transport_retries: u32 = parse_var(&lookup, "FLOWGATE_MAX_RETRIES", 3)?;

        Ok(Self::new(base_url)
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_max_transport_retries(max_transport_retries))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    pub fn with_retry(mut self, retry: PollConfig) -> Self {
        self.retry = retry;
        self
    }

    /// WebSocket root derived from `base_url`.
    pub fn ws_url(&self) -> String {
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        }
    }
}

/// Parse `key` from `lookup`, falling back to `default` when unset.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> ClientResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ClientError::Config(format!("{key}='{raw}' is not valid: {e}"))),
    }
}
