//! Feed Transport Session
//!
//! Owns one WebSocket connection to the listing feed.
//!
//! # Handshake
//!
//! 1. Dial the feed URL with the `Origin` and `User-Agent` headers the
//!    feed requires
//! 2. Send the session token as the first text frame (skipped when empty)
//! 3. Send one text frame per channel name to subscribe
//!
//! Any failure aborts the whole handshake: the caller gets an error and the
//! half-built session is closed and dropped. A session is never reused after
//! an error; the supervisor builds a fresh one for every attempt.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::application::ports::FeedConnector;
use crate::infrastructure::config::FeedSettings;

/// Upper bound on the close handshake before the connection is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outbound half of a boxed WebSocket.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Inbound half of a boxed WebSocket.
pub type FrameStream = BoxStream<'static, Result<Message, tungstenite::Error>>;

// =============================================================================
// Error Type
// =============================================================================

/// Step of the session lifecycle an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the WebSocket.
    Dial,
    /// Sending the session token.
    Authenticate,
    /// Sending a channel subscription.
    Subscribe,
    /// Sending a keep-alive frame.
    Heartbeat,
    /// Reading the next frame.
    Receive,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dial => "dial",
            Self::Authenticate => "authenticate",
            Self::Subscribe => "subscribe",
            Self::Heartbeat => "heartbeat",
            Self::Receive => "receive",
        })
    }
}

/// Errors that can occur on a feed session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Transport failure.
    #[error("network error during {stage}: {message}")]
    Network {
        /// Where the failure happened.
        stage: Stage,
        /// Underlying error text.
        message: String,
    },

    /// Peer closed the connection or the stream ended.
    #[error("connection closed: {0}")]
    Closed(String),
}

impl SessionError {
    /// Build a network error for a stage.
    pub fn network(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Network {
            stage,
            message: err.to_string(),
        }
    }

    /// Stage of a network error (`None` for closures).
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Network { stage, .. } => Some(*stage),
            Self::Closed(_) => None,
        }
    }
}

// =============================================================================
// Writer / Reader Halves
// =============================================================================

/// Sending half of a session.
pub struct FeedWriter {
    sink: FrameSink,
}

impl FeedWriter {
    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns a network error tagged with `stage` if the send fails.
    pub async fn send_text(&mut self, text: &str, stage: Stage) -> Result<(), SessionError> {
        self.sink
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| SessionError::network(stage, e))
    }

    /// Close the connection. Consumes the writer, so it runs once.
    pub async fn close(mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close()).await {
            Ok(Ok(())) => tracing::debug!("Feed session closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Feed session close failed"),
            Err(_) => tracing::debug!("Feed session close timed out"),
        }
    }
}

/// Receiving half of a session.
pub struct FeedReader {
    stream: FrameStream,
}

impl FeedReader {
    /// Wait for the next data frame.
    ///
    /// Ping, pong and raw frames are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Closed` on a close frame or end of stream, and a network
    /// error if the transport fails.
    pub async fn recv(&mut self) -> Result<Vec<u8>, SessionError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().as_bytes().to_vec()),
                Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "close frame".to_string(),
                        |f| format!("{} {}", f.code, f.reason.as_str()),
                    );
                    return Err(SessionError::Closed(reason));
                }
                Some(Err(e)) => return Err(SessionError::network(Stage::Receive, e)),
                None => return Err(SessionError::Closed("stream ended".to_string())),
            }
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One live connection to the feed.
pub struct FeedSession {
    writer: FeedWriter,
    reader: FeedReader,
}

impl FeedSession {
    /// Build a session from already-separated halves.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            writer: FeedWriter { sink },
            reader: FeedReader { stream },
        }
    }

    /// Build a session from a duplex WebSocket.
    pub fn from_socket<S>(socket: S) -> Self
    where
        S: Sink<Message, Error = tungstenite::Error>
            + Stream<Item = Result<Message, tungstenite::Error>>
            + Send
            + 'static,
    {
        let (sink, stream) = socket.split();
        Self::new(Box::pin(sink), stream.boxed())
    }

    /// Authenticate and subscribe.
    ///
    /// # Errors
    ///
    /// Returns a network error for the first frame that cannot be sent.
    pub async fn handshake(&mut self, token: &str, channels: &[String]) -> Result<(), SessionError> {
        if !token.is_empty() {
            self.send(token, Stage::Authenticate).await?;
        }

        for channel in channels {
            self.send(channel, Stage::Subscribe).await?;
            tracing::debug!(channel = %channel, "Subscribed");
        }

        Ok(())
    }

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns a network error tagged with `stage` if the send fails.
    pub async fn send(&mut self, text: &str, stage: Stage) -> Result<(), SessionError> {
        self.writer.send_text(text, stage).await
    }

    /// Receive the next data frame.
    ///
    /// # Errors
    ///
    /// See [`FeedReader::recv`].
    pub async fn receive(&mut self) -> Result<Vec<u8>, SessionError> {
        self.reader.recv().await
    }

    /// Close the connection.
    pub async fn close(self) {
        self.writer.close().await;
    }

    /// Separate the halves so reading can move to its own task.
    #[must_use]
    pub fn split(self) -> (FeedWriter, FeedReader) {
        (self.writer, self.reader)
    }
}

impl fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSession").finish_non_exhaustive()
    }
}

// =============================================================================
// WebSocket Connector
// =============================================================================

/// Dials the feed over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    settings: FeedSettings,
}

impl WsConnector {
    /// Create a connector for the configured feed.
    #[must_use]
    pub const fn new(settings: FeedSettings) -> Self {
        Self { settings }
    }

    async fn dial(&self) -> Result<FeedSession, SessionError> {
        let mut request = self
            .settings
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::network(Stage::Dial, e))?;

        let origin = HeaderValue::from_str(&self.settings.origin)
            .map_err(|e| SessionError::network(Stage::Dial, e))?;
        let user_agent = HeaderValue::from_str(&self.settings.user_agent)
            .map_err(|e| SessionError::network(Stage::Dial, e))?;

        let headers = request.headers_mut();
        headers.insert(header::ORIGIN, origin);
        headers.insert(header::USER_AGENT, user_agent);

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::network(Stage::Dial, e))?;

        Ok(FeedSession::from_socket(socket))
    }
}

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, token: &str) -> Result<FeedSession, SessionError> {
        tracing::info!(url = %self.settings.url, "Connecting to feed");

        let mut session = self.dial().await.inspect_err(|e| {
            tracing::error!(error = %e, "Connection error");
        })?;

        if let Err(e) = session.handshake(token, &self.settings.channels).await {
            tracing::error!(error = %e, "Handshake failed");
            session.close().await;
            return Err(e);
        }

        tracing::info!("Connected successfully");
        Ok(session)
    }
}
