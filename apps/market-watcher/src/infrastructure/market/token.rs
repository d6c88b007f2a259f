//! Feed Token Exchange
//!
//! The feed only accepts connections that present a short-lived token as
//! their first frame. Tokens are issued by the market API in exchange for
//! the account API key.
//!
//! # Exchange Flow
//!
//! 1. `POST <token_url>?key=<api key>` with an empty body
//! 2. Receive `{"success":true,"token":"..."}` or
//!    `{"success":false,"error":"..."}`
//! 3. Trust the token locally for the configured lifetime (9 minutes by
//!    default, shorter than the server-side expiry)

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

use crate::application::ports::TokenSource;
use crate::domain::session::{DEFAULT_TOKEN_LIFETIME, SessionToken};
use crate::infrastructure::config::TokenSettings;
use crate::infrastructure::metrics::{self, TokenOutcome};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while obtaining a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Request could not be sent or the response could not be read.
    #[error("token request failed: {0}")]
    Network(String),

    /// Response body was not the expected JSON document.
    #[error("token response could not be parsed: {0}")]
    Parse(String),

    /// Endpoint answered but refused to issue a token.
    #[error("token endpoint error: {0}")]
    Remote(String),
}

impl TokenError {
    const fn outcome(&self) -> TokenOutcome {
        match self {
            Self::Network(_) => TokenOutcome::Network,
            Self::Parse(_) => TokenOutcome::Parse,
            Self::Remote(_) => TokenOutcome::Remote,
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

/// Body returned by the token endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Whether a token was issued.
    #[serde(default)]
    pub success: bool,
    /// Issued token (present on success).
    #[serde(default)]
    pub token: String,
    /// Failure reason (present on failure).
    #[serde(default)]
    pub error: String,
}

/// Turn a raw response body into a token issued at `issued_at`.
///
/// # Errors
///
/// Returns `Parse` for undecodable bodies and `Remote` when the endpoint
/// reports failure.
pub fn parse_token_response(
    body: &str,
    issued_at: chrono::DateTime<Utc>,
    lifetime: chrono::Duration,
) -> Result<SessionToken, TokenError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|e| TokenError::Parse(e.to_string()))?;

    if response.success {
        Ok(SessionToken::issued(response.token, issued_at, lifetime))
    } else if response.error.is_empty() {
        Err(TokenError::Remote("endpoint reported failure".to_string()))
    } else {
        Err(TokenError::Remote(response.error))
    }
}

// =============================================================================
// Token Client
// =============================================================================

/// HTTP client for the token endpoint.
#[derive(Clone)]
pub struct TokenClient {
    client: Client,
    url: String,
    api_key: String,
    lifetime: chrono::Duration,
}

impl TokenClient {
    /// Create a new token client.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the HTTP client cannot be constructed.
    pub fn new(settings: &TokenSettings) -> Result<Self, TokenError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| TokenError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: settings.api_key().to_string(),
            lifetime: chrono::Duration::from_std(settings.lifetime)
                .unwrap_or(DEFAULT_TOKEN_LIFETIME),
        })
    }

    /// Exchange the API key for a fresh session token.
    ///
    /// # Errors
    ///
    /// See [`TokenError`].
    pub async fn request_token(&self) -> Result<SessionToken, TokenError> {
        let result = self.exchange().await;

        match &result {
            Ok(token) => {
                tracing::info!(expires_at = %token.expires_at(), "Token updated");
                metrics::record_token_refresh(TokenOutcome::Issued);
            }
            Err(e) => {
                tracing::error!(error = %e, "Token exchange failed");
                metrics::record_token_refresh(e.outcome());
            }
        }

        result
    }

    async fn exchange(&self) -> Result<SessionToken, TokenError> {
        // `without_url` keeps the API key in the query string out of logs.
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| TokenError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TokenError::Network(e.without_url().to_string()))?;

        parse_token_response(&body, Utc::now(), self.lifetime).map_err(|e| match e {
            TokenError::Parse(msg) => TokenError::Parse(format!("HTTP {status}: {msg}")),
            other => other,
        })
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for TokenClient {
    async fn acquire(&self) -> Result<SessionToken, TokenError> {
        self.request_token().await
    }
}
