//! Client configuration: defaults, then environment overrides.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const BASE_URL_ENV: &str = "WORLDSIM_API_URL";
pub const STATE_POLL_ENV: &str = "WORLDSIM_STATE_POLL_MS";
pub const LOGS_POLL_ENV: &str = "WORLDSIM_LOGS_POLL_MS";
pub const LOG_WINDOW_ENV: &str = "WORLDSIM_LOG_WINDOW";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_STATE_POLL: Duration = Duration::from_secs(5);
const DEFAULT_LOGS_POLL: Duration = Duration::from_secs(10);
const DEFAULT_LOG_WINDOW: usize = 100;
const DEFAULT_BANNER_TTL: Duration = Duration::from_secs(5);

/// Cadence of the background refreshes for an active simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub state_interval: Duration,
    pub logs_interval: Duration,
    /// Number of most recent log entries requested on every refresh.
    pub log_window: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            state_interval: DEFAULT_STATE_POLL,
            logs_interval: DEFAULT_LOGS_POLL,
            log_window: DEFAULT_LOG_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll: PollConfig,
    /// How long a setup error stays in the banner.
    pub banner_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll: PollConfig::default(),
            banner_ttl: DEFAULT_BANNER_TTL,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with whatever the process environment provides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(BASE_URL_ENV)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
        {
            config.base_url = url;
        }
        if let Some(ms) = positive(lookup(STATE_POLL_ENV)) {
            config.poll.state_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = positive(lookup(LOGS_POLL_ENV)) {
            config.poll.logs_interval = Duration::from_millis(ms);
        }
        if let Some(window) = positive(lookup(LOG_WINDOW_ENV)) {
            config.poll.log_window = window as usize;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn positive(raw: Option<String>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
