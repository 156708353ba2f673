//! Stream configuration: credentials, topics, endpoint and timings.
//!
//! DESIGN
//! ======
//! Everything the session needs is fixed at construction. Group ids keep
//! the caller's order (minus duplicates) so subscribe traffic is
//! reproducible. Timings default to the fixed delays the push service
//! expects: 5s between reconnects and handshake retries, 30s between pings.

use std::time::Duration;

pub const DEFAULT_PUSH_URL: &str = "wss://push.groupme.com/faye";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
pub const DEFAULT_HANDSHAKE_RETRY_MS: u64 = 5_000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Fixed delays driving reconnects, handshake retries and liveness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimings {
    pub reconnect_delay: Duration,
    pub handshake_retry_delay: Duration,
    pub ping_interval: Duration,
}

impl Default for StreamTimings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            handshake_retry_delay: Duration::from_millis(DEFAULT_HANDSHAKE_RETRY_MS),
            ping_interval: Duration::from_millis(DEFAULT_PING_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub url: String,
    pub access_token: String,
    pub user_id: String,
    /// Deduplicated, in the order given.
    pub group_ids: Vec<String>,
    pub timings: StreamTimings,
}

impl StreamConfig {
    pub fn new<I, S>(access_token: impl Into<String>, user_id: impl Into<String>, group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: DEFAULT_PUSH_URL.to_owned(),
            access_token: access_token.into(),
            user_id: user_id.into(),
            group_ids: normalize_group_ids(group_ids),
            timings: StreamTimings::default(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Replace the group list, with the same de-duplication as [`StreamConfig::new`].
    #[must_use]
    pub fn with_group_ids<I, S>(mut self, group_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_ids = normalize_group_ids(group_ids);
        self
    }

    #[must_use]
    pub fn with_timings(mut self, timings: StreamTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Build config from environment variables.
    ///
    /// Required:
    /// - `PUSHSTREAM_ACCESS_TOKEN`
    /// - `PUSHSTREAM_USER_ID`
    ///
    /// Optional:
    /// - `PUSHSTREAM_GROUP_IDS`: comma-separated group ids
    /// - `PUSHSTREAM_URL`: default `wss://push.groupme.com/faye`
    /// - `PUSHSTREAM_RECONNECT_DELAY_MS`: default 5000
    /// - `PUSHSTREAM_HANDSHAKE_RETRY_MS`: default 5000
    /// - `PUSHSTREAM_PING_INTERVAL_MS`: default 30000
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token = required_var("PUSHSTREAM_ACCESS_TOKEN")?;
        let user_id = required_var("PUSHSTREAM_USER_ID")?;
        let group_ids = std::env::var("PUSHSTREAM_GROUP_IDS").unwrap_or_default();
        let url = std::env::var("PUSHSTREAM_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PUSH_URL.to_owned());
        let timings = StreamTimings {
            reconnect_delay: Duration::from_millis(env_parse("PUSHSTREAM_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)),
            handshake_retry_delay: Duration::from_millis(env_parse(
                "PUSHSTREAM_HANDSHAKE_RETRY_MS",
                DEFAULT_HANDSHAKE_RETRY_MS,
            )),
            ping_interval: Duration::from_millis(env_parse("PUSHSTREAM_PING_INTERVAL_MS", DEFAULT_PING_INTERVAL_MS)),
        };

        Ok(Self::new(access_token, user_id, group_ids.split(','))
            .with_url(url)
            .with_timings(timings))
    }
}

fn required_var(key: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Empty(key));
    }
    Ok(value.to_owned())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Trim, drop empties and duplicates, keep first-seen order.
fn normalize_group_ids<I, S>(group_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for id in group_ids {
        let id: String = id.into();
        let id = id.trim();
        if id.is_empty() || out.iter().any(|seen| seen == id) {
            continue;
        }
        out.push(id.to_owned());
    }
    out
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
