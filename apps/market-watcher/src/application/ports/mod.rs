//! Port Interfaces
//!
//! Defines the interfaces (ports) the watcher depends on. Infrastructure
//! adapters implement them; tests substitute in-memory fakes.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TokenSource`: Issues session tokens for the feed
//! - `FeedConnector`: Opens authenticated, subscribed feed sessions

use async_trait::async_trait;

use crate::domain::session::SessionToken;
use crate::infrastructure::market::{FeedSession, SessionError, TokenError};

/// Source of feed session tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a fresh token.
    async fn acquire(&self) -> Result<SessionToken, TokenError>;
}

/// Opens feed sessions.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Dial the feed, present `token` and subscribe.
    ///
    /// An empty `token` skips the authentication frame.
    async fn connect(&self, token: &str) -> Result<FeedSession, SessionError>;
}
