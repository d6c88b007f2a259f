//! Reconnection Supervisor
//!
//! Drives the watcher through
//! `Uninitialized → TokenValid → Connected → Listening → Failed` and back,
//! indefinitely, until the retry budget runs out.
//!
//! Every cycle:
//!
//! 1. Reuse the held token if it is still valid, otherwise fetch a new one
//! 2. Connect and subscribe
//! 3. Listen until the session fails
//!
//! A failure at any step is counted. Once the count reaches the configured
//! maximum the supervisor returns [`WatcherError::RetriesExhausted`];
//! otherwise it sleeps the fixed reconnect delay and starts over.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::application::ports::{FeedConnector, TokenSource};
use crate::domain::session::SessionToken;
use crate::infrastructure::config::WatcherConfig;
use crate::infrastructure::market::{
    HeartbeatConfig, HeartbeatManager, HeartbeatState, ListingCodec, ReconnectConfig,
    ReconnectPolicy, SessionError, TokenError,
};
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// Why one connect-and-listen cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    /// Token acquisition failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Connecting or listening failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Terminal watcher errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatcherError {
    /// The retry budget is spent.
    #[error("maximum retries exceeded after {attempts} failed attempts (last error: {last})")]
    RetriesExhausted {
        /// Failed cycles counted.
        attempts: u32,
        /// Failure that spent the budget.
        last: CycleError,
    },
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Nothing attempted yet.
    Uninitialized,
    /// A valid token is held.
    TokenValid,
    /// A session is open and subscribed.
    Connected,
    /// The read loop is running.
    Listening,
    /// The last cycle failed.
    Failed,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::TokenValid => "token_valid",
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Failed => "failed",
        })
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Keeps one feed subscription alive.
pub struct Watcher<T, C> {
    tokens: T,
    connector: C,
    codec: ListingCodec,
    heartbeat: HeartbeatManager,
    policy: ReconnectPolicy,
    reset_after: Option<Duration>,
    token: Option<SessionToken>,
    state: WatcherState,
}

impl<T, C> Watcher<T, C>
where
    T: TokenSource,
    C: FeedConnector,
{
    /// Create a watcher from its ports and configuration.
    #[must_use]
    pub fn new(tokens: T, connector: C, config: &WatcherConfig) -> Self {
        Self {
            tokens,
            connector,
            codec: ListingCodec::new(config.feed.item_tag.clone()),
            heartbeat: HeartbeatManager::new(
                HeartbeatConfig::from_feed_settings(&config.feed),
                Arc::new(HeartbeatState::new()),
            ),
            policy: ReconnectPolicy::new(ReconnectConfig::from_retry_settings(&config.retry)),
            reset_after: config.retry.reset_after,
            token: None,
            state: WatcherState::Uninitialized,
        }
    }

    /// Start with a token already in hand.
    #[must_use]
    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WatcherState {
        self.state
    }

    /// Held token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Failed cycles counted so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.policy.attempt_count()
    }

    /// Heartbeat bookkeeping for the current session.
    #[must_use]
    pub fn heartbeat_state(&self) -> Arc<HeartbeatState> {
        Arc::clone(self.heartbeat.state())
    }

    /// Run until the retry budget is spent.
    ///
    /// Only returns on a terminal error.
    pub async fn run(&mut self) -> WatcherError {
        self.policy.reset();

        loop {
            let (error, listened) = self.cycle().await;
            metrics::set_connected(false);
            self.transition(WatcherState::Failed);

            if self
                .reset_after
                .zip(listened)
                .is_some_and(|(threshold, listened)| listened >= threshold)
            {
                tracing::info!(
                    listened_ms = listened.map_or(0, |d| d.as_millis()),
                    "Session was stable, resetting retry budget"
                );
                self.policy.reset();
            }

            let Some(delay) = self.policy.record_failure() else {
                let attempts = self.policy.attempt_count();
                tracing::error!(attempts, error = %error, "Maximum retries exceeded");
                return WatcherError::RetriesExhausted {
                    attempts,
                    last: error,
                };
            };

            tracing::warn!(
                attempt = self.policy.attempt_count(),
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis(),
                error = %error,
                "Reconnecting"
            );
            metrics::record_reconnect();
            tokio::time::sleep(delay).await;
        }
    }

    /// One token → connect → listen pass. Returns the failure that ended it
    /// and, if listening started, how long it lasted.
    async fn cycle(&mut self) -> (CycleError, Option<Duration>) {
        let token = match self.ensure_token().await {
            Ok(token) => token,
            Err(e) => return (e.into(), None),
        };
        self.transition(WatcherState::TokenValid);

        let session = match self.connector.connect(&token).await {
            Ok(session) => session,
            Err(e) => return (e.into(), None),
        };
        self.transition(WatcherState::Connected);
        metrics::set_connected(true);

        self.transition(WatcherState::Listening);
        let started = Instant::now();
        let error = self.heartbeat.run(session, self.codec.clone()).await;

        (error.into(), Some(started.elapsed()))
    }

    async fn ensure_token(&mut self) -> Result<String, TokenError> {
        if let Some(token) = self.token.as_ref().filter(|token| token.is_valid()) {
            return Ok(token.value().to_string());
        }

        if self.token.take().is_some() {
            tracing::info!("Token expired, refreshing");
        }

        let token = self.tokens.acquire().await?;
        let value = token.value().to_string();
        self.token = Some(token);
        Ok(value)
    }

    fn transition(&mut self, next: WatcherState) {
        tracing::debug!(from = %self.state, to = %next, "Watcher state");
        self.state = next;
    }
}

impl<T, C> fmt::Debug for Watcher<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
