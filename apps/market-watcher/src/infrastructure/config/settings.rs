//! Watcher Configuration Settings
//!
//! Configuration types for the watcher, loaded from environment variables.
//! Every setting except the API key has a default matching the market's
//! published connection rules.

use std::path::PathBuf;
use std::time::Duration;

/// Default token issuance endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://market.csgo.com/api/v2/get-ws-token";

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://wsn.dota2.net/wsn/";

/// Origin the feed expects on the handshake.
pub const DEFAULT_FEED_ORIGIN: &str = "https://market.csgo.com";

/// Channel announcing new listings.
pub const DEFAULT_FEED_CHANNEL: &str = "newitems_go";

/// Desktop browser identity; the feed rejects handshakes without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Token endpoint settings.
#[derive(Clone)]
pub struct TokenSettings {
    api_key: String,
    /// Token issuance endpoint (without query string).
    pub url: String,
    /// How long an issued token is trusted locally.
    pub lifetime: Duration,
    /// Timeout for the issuance request.
    pub request_timeout: Duration,
}

impl TokenSettings {
    /// Create settings for the given API key with default endpoint and timings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: DEFAULT_TOKEN_URL.to_string(),
            lifetime: Duration::from_secs(9 * 60),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("api_key", &"[REDACTED]")
            .field("url", &self.url)
            .field("lifetime", &self.lifetime)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Feed connection settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// WebSocket URL.
    pub url: String,
    /// `Origin` header sent on the handshake.
    pub origin: String,
    /// `User-Agent` header sent on the handshake.
    pub user_agent: String,
    /// Channels subscribed after authentication.
    pub channels: Vec<String>,
    /// Message `type` tagging new-listing announcements.
    pub item_tag: String,
    /// Interval between keep-alive frames.
    pub heartbeat_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            origin: DEFAULT_FEED_ORIGIN.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            channels: vec![DEFAULT_FEED_CHANNEL.to_string()],
            item_tag: DEFAULT_FEED_CHANNEL.to_string(),
            heartbeat_interval: Duration::from_secs(45),
        }
    }
}

/// Reconnection settings.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,
    /// Failed cycles allowed over the process lifetime.
    pub max_retries: u32,
    /// Listening this long without failure clears the failure count
    /// (`None` keeps the count for the whole process lifetime).
    pub reset_after: Option<Duration>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_retries: 5,
            reset_after: None,
        }
    }
}

/// Log sink and observability settings.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory receiving the per-run log file.
    pub dir: PathBuf,
    /// Mirror log output to stderr.
    pub stderr: bool,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            stderr: true,
            metrics_port: 0,
        }
    }
}

/// Complete watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Token endpoint settings.
    pub token: TokenSettings,
    /// Feed connection settings.
    pub feed: FeedSettings,
    /// Reconnection settings.
    pub retry: RetrySettings,
    /// Log sink settings.
    pub log: LogSettings,
}

impl WatcherConfig {
    /// Create configuration with defaults for everything but the API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            token: TokenSettings::new(api_key),
            feed: FeedSettings::default(),
            retry: RetrySettings::default(),
            log: LogSettings::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `MARKET_API_KEY` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("MARKET_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("MARKET_API_KEY".to_string()))?;

        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("MARKET_API_KEY".to_string()));
        }

        let mut config = Self::new(api_key.trim());

        if let Some(url) = non_empty(&lookup, "MARKET_TOKEN_URL") {
            config.token.url = url;
        }
        config.token.lifetime = parse_duration_secs(
            &lookup,
            "WATCHER_TOKEN_LIFETIME_SECS",
            config.token.lifetime,
        );
        config.token.request_timeout = parse_duration_secs(
            &lookup,
            "WATCHER_REQUEST_TIMEOUT_SECS",
            config.token.request_timeout,
        );

        if let Some(url) = non_empty(&lookup, "MARKET_FEED_URL") {
            config.feed.url = url;
        }
        if let Some(origin) = non_empty(&lookup, "MARKET_FEED_ORIGIN") {
            config.feed.origin = origin;
        }
        if let Some(channel) = non_empty(&lookup, "MARKET_FEED_CHANNEL") {
            config.feed.channels = vec![channel.clone()];
            config.feed.item_tag = channel;
        }
        config.feed.heartbeat_interval = parse_duration_secs(
            &lookup,
            "WATCHER_HEARTBEAT_INTERVAL_SECS",
            config.feed.heartbeat_interval,
        );

        config.retry.reconnect_delay = parse_duration_secs(
            &lookup,
            "WATCHER_RECONNECT_DELAY_SECS",
            config.retry.reconnect_delay,
        );
        config.retry.max_retries =
            parse_u32(&lookup, "WATCHER_MAX_RETRIES", config.retry.max_retries);
        config.retry.reset_after = Some(parse_duration_secs(
            &lookup,
            "WATCHER_RETRY_RESET_AFTER_SECS",
            Duration::ZERO,
        ))
        .filter(|after| !after.is_zero());

        if let Some(dir) = non_empty(&lookup, "WATCHER_LOG_DIR") {
            config.log.dir = PathBuf::from(dir);
        }
        config.log.stderr = lookup("WATCHER_LOG_STDERR")
            .map_or(config.log.stderr, |v| v.trim().to_lowercase() != "false");
        config.log.metrics_port =
            parse_u16(&lookup, "WATCHER_METRICS_PORT", config.log.metrics_port);

        Ok(config)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32<F>(lookup: &F, key: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let result = WatcherConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(key)) if key == "MARKET_API_KEY"));
    }

    #[test]
    fn empty_api_key_is_an_error() {
        let result = WatcherConfig::from_lookup(lookup_from(&[("MARKET_API_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::EmptyValue(_))));
    }

    #[test]
    fn defaults_match_market_rules() {
        let config = WatcherConfig::from_lookup(lookup_from(&[("MARKET_API_KEY", "k")])).unwrap();

        assert_eq!(config.token.url, DEFAULT_TOKEN_URL);
        assert_eq!(config.token.lifetime, Duration::from_secs(540));
        assert_eq!(config.feed.url, DEFAULT_FEED_URL);
        assert_eq!(config.feed.origin, DEFAULT_FEED_ORIGIN);
        assert_eq!(config.feed.channels, vec!["newitems_go"]);
        assert_eq!(config.feed.item_tag, "newitems_go");
        assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(45));
        assert_eq!(config.retry.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 5);
        assert!(config.retry.reset_after.is_none());
        assert_eq!(config.log.dir, PathBuf::from("logs"));
        assert_eq!(config.log.metrics_port, 0);
    }

    #[test]
    fn overrides_are_applied() {
        let config = WatcherConfig::from_lookup(lookup_from(&[
            ("MARKET_API_KEY", "k"),
            ("MARKET_FEED_URL", "ws://127.0.0.1:9000/"),
            ("MARKET_FEED_CHANNEL", "newitems_dota"),
            ("WATCHER_RECONNECT_DELAY_SECS", "2"),
            ("WATCHER_MAX_RETRIES", "9"),
            ("WATCHER_HEARTBEAT_INTERVAL_SECS", "30"),
            ("WATCHER_RETRY_RESET_AFTER_SECS", "600"),
            ("WATCHER_LOG_DIR", "/var/log/watcher"),
            ("WATCHER_LOG_STDERR", "false"),
        ]))
        .unwrap();

        assert_eq!(config.feed.url, "ws://127.0.0.1:9000/");
        assert_eq!(config.feed.channels, vec!["newitems_dota"]);
        assert_eq!(config.feed.item_tag, "newitems_dota");
        assert_eq!(config.retry.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.retry.max_retries, 9);
        assert_eq!(config.feed.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.retry.reset_after, Some(Duration::from_secs(600)));
        assert_eq!(config.log.dir, PathBuf::from("/var/log/watcher"));
        assert!(!config.log.stderr);
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let config = WatcherConfig::from_lookup(lookup_from(&[
            ("MARKET_API_KEY", "k"),
            ("WATCHER_MAX_RETRIES", "many"),
            ("WATCHER_RECONNECT_DELAY_SECS", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn token_settings_redacted_debug() {
        let settings = TokenSettings::new("key123");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("key123"));
        assert!(debug.contains("[REDACTED]"));
    }
}
