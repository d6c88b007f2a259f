//! Reconnection Policy
//!
//! Fixed-delay retry with a bounded failure budget. Every failed cycle
//! (token, connect or listen) is counted; once the count reaches the
//! maximum the policy refuses further attempts.

use std::time::Duration;

use crate::domain::session::RetryCounter;
use crate::infrastructure::config::RetrySettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause between a failed cycle and the next attempt.
    pub delay: Duration,
    /// Failed cycles tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Create configuration from `RetrySettings`.
    #[must_use]
    pub const fn from_retry_settings(settings: &RetrySettings) -> Self {
        Self {
            delay: settings.reconnect_delay,
            max_attempts: settings.max_retries,
        }
    }
}

/// Reconnection policy with a fixed delay.
///
/// # Example
///
/// ```rust
/// use market_watcher::infrastructure::market::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::new(Duration::from_secs(5), 2));
///
/// assert_eq!(policy.record_failure(), Some(Duration::from_secs(5)));
/// assert_eq!(policy.record_failure(), None);
/// assert!(!policy.should_retry());
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    failures: RetryCounter,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let failures = RetryCounter::new(config.max_attempts);
        Self { config, failures }
    }

    /// Count a failed cycle.
    ///
    /// Returns the delay to wait before the next attempt, or `None` once the
    /// failure budget is spent.
    #[must_use]
    pub const fn record_failure(&mut self) -> Option<Duration> {
        self.failures.increment();
        if self.failures.is_exhausted() {
            None
        } else {
            Some(self.config.delay)
        }
    }

    /// Forget all counted failures.
    pub const fn reset(&mut self) {
        self.failures.reset();
    }

    /// Failed cycles counted so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.failures.count()
    }

    /// Maximum failed cycles tolerated.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.failures.max()
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        !self.failures.is_exhausted()
    }

    /// Fixed delay between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.config.delay
    }
}
