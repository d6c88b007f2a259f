//! Session Bookkeeping
//!
//! The feed requires a short-lived token obtained from the market API, and
//! the watcher is allowed a fixed number of failed connection cycles over
//! its lifetime. Both pieces of state live here.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// How long a freshly issued token is trusted locally.
///
/// The server honours tokens for longer; refreshing early keeps us from
/// ever handshaking with one that expires mid-connect.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(9);

// =============================================================================
// Session Token
// =============================================================================

/// Credential used to authenticate the feed connection.
///
/// Tokens are immutable: a refresh replaces the whole value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Create a token that expires at the given instant.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Create a token issued at `issued_at` and trusted for `lifetime`.
    ///
    /// A lifetime past the end of the calendar saturates at its last instant.
    #[must_use]
    pub fn issued(value: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(value, expires_at)
    }

    /// Get the raw token text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the local expiry instant.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check validity at a given instant (`now < expires_at`).
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Check validity against the current wall clock.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// =============================================================================
// Retry Counter
// =============================================================================

/// Cumulative count of failed connection cycles.
///
/// Only an explicit [`RetryCounter::reset`] lowers the count; a healthy
/// session does not replenish the budget on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    count: u32,
    max: u32,
}

impl RetryCounter {
    /// Create a counter allowing `max` failed cycles.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// Record one failed cycle and return the new count.
    pub const fn increment(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Number of failed cycles so far.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Configured budget.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Whether the budget is used up (`count >= max`).
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }

    /// Clear the count.
    pub const fn reset(&mut self) {
        self.count = 0;
    }
}
