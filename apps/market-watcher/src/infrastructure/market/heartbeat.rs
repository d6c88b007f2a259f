//! Heartbeat & Read Loop
//!
//! Runs one live session until it fails.
//!
//! A spawned reader task pulls frames and hands each one to the codec. The
//! calling task keeps the writer half and sends `ping` on a fixed interval.
//! The loop ends on whichever comes first: the reader's completion signal
//! or a failed heartbeat send. On the way out the reader task is stopped
//! and the connection is closed once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use super::codec::ListingCodec;
use super::session::{FeedReader, FeedSession, SessionError, Stage};
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics;

/// Keep-alive frame understood by the feed.
pub const PING_FRAME: &str = "ping";

/// Shortest interval the ticker accepts.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest interval the ticker accepts.
const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping frames.
    pub ping_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(45),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with a custom interval.
    #[must_use]
    pub const fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }

    /// Create configuration from `FeedSettings`.
    #[must_use]
    pub const fn from_feed_settings(settings: &FeedSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
        }
    }
}

/// Heartbeat bookkeeping for the current session.
#[derive(Debug, Default)]
pub struct HeartbeatState {
    last_ping: RwLock<Option<Instant>>,
    pings_sent: AtomicU64,
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a ping that reached the transport.
    pub fn record_ping(&self) {
        *self.last_ping.write() = Some(Instant::now());
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// When the last ping was sent, if any.
    #[must_use]
    pub fn last_ping(&self) -> Option<Instant> {
        *self.last_ping.read()
    }

    /// Pings sent on the current session.
    #[must_use]
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }

    /// Reset state for a new session.
    pub fn reset(&self) {
        *self.last_ping.write() = None;
        self.pings_sent.store(0, Ordering::Relaxed);
    }
}

/// Drives a session's read loop and keep-alive ticker.
#[derive(Debug)]
pub struct HeartbeatManager {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
}

impl HeartbeatManager {
    /// Create a new heartbeat manager.
    #[must_use]
    pub const fn new(config: HeartbeatConfig, state: Arc<HeartbeatState>) -> Self {
        Self { config, state }
    }

    /// Shared heartbeat state.
    #[must_use]
    pub const fn state(&self) -> &Arc<HeartbeatState> {
        &self.state
    }

    /// Listen on `session` until it fails and return the failure.
    ///
    /// The session is consumed and closed before this returns.
    pub async fn run(&self, session: FeedSession, codec: ListingCodec) -> SessionError {
        self.state.reset();

        let (mut writer, reader) = session.split();
        let (done_tx, mut done_rx) = oneshot::channel();
        let reader_task = tokio::spawn(async move {
            let _ = done_tx.send(read_frames(reader, &codec).await);
        });

        let period = self.config.ping_interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let error = loop {
            tokio::select! {
                biased;

                result = &mut done_rx => {
                    break result.unwrap_or_else(|_| {
                        SessionError::Closed("reader task stopped".to_string())
                    });
                }
                _ = ticker.tick() => {
                    if let Err(e) = writer.send_text(PING_FRAME, Stage::Heartbeat).await {
                        break e;
                    }
                    self.state.record_ping();
                    metrics::record_heartbeat();
                    tracing::debug!(pings = self.state.pings_sent(), "Heartbeat sent");
                }
            }
        };

        reader_task.abort();
        writer.close().await;

        match &error {
            SessionError::Closed(reason) => tracing::warn!(reason = %reason, "Feed closed"),
            SessionError::Network { .. } => tracing::error!(error = %error, "Feed session failed"),
        }

        error
    }
}

async fn read_frames(mut reader: FeedReader, codec: &ListingCodec) -> SessionError {
    loop {
        match reader.recv().await {
            Ok(frame) => codec.handle(&frame),
            Err(e) => return e,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::{self, Message};

    use super::*;
    use crate::infrastructure::market::session::FrameSink;

    type Inbound = mpsc::UnboundedSender<Result<Message, tungstenite::Error>>;
    type Outbound = mpsc::UnboundedReceiver<Message>;

    fn memory_session() -> (FeedSession, Inbound, Outbound) {
        let (out_tx, out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Result<Message, tungstenite::Error>>();
        let sink: FrameSink =
            Box::pin(out_tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed));
        (FeedSession::new(sink, in_rx.boxed()), in_tx, out_rx)
    }

    fn manager(interval: Duration) -> HeartbeatManager {
        HeartbeatManager::new(
            HeartbeatConfig::new(interval),
            Arc::new(HeartbeatState::new()),
        )
    }

    fn codec() -> ListingCodec {
        ListingCodec::new("newitems_go")
    }

    fn text(value: &str) -> Result<Message, tungstenite::Error> {
        Ok(Message::Text(value.to_string().into()))
    }

    #[test]
    fn default_interval_is_45_seconds() {
        assert_eq!(HeartbeatConfig::default().ping_interval, Duration::from_secs(45));
    }

    #[test]
    fn state_tracks_pings() {
        let state = HeartbeatState::new();
        assert!(state.last_ping().is_none());

        state.record_ping();
        state.record_ping();
        assert_eq!(state.pings_sent(), 2);
        assert!(state.last_ping().is_some());

        state.reset();
        assert_eq!(state.pings_sent(), 0);
        assert!(state.last_ping().is_none());
    }

    #[tokio::test]
    async fn quiet_feed_keeps_loop_pending() {
        let (session, _inbound, _outbound) = memory_session();
        let heartbeat = manager(Duration::from_secs(60));

        let mut running = tokio_test::task::spawn(heartbeat.run(session, codec()));
        tokio_test::assert_pending!(running.poll());
    }

    #[tokio::test]
    async fn reader_close_ends_loop_and_closes_writer() {
        let (session, inbound, mut outbound) = memory_session();
        inbound
            .unbounded_send(Ok(Message::Close(None)))
            .unwrap();

        let err = manager(Duration::from_secs(60)).run(session, codec()).await;

        assert!(matches!(err, SessionError::Closed(_)));
        assert!(outbound.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_end_is_closed() {
        let (session, inbound, _outbound) = memory_session();
        drop(inbound);

        let err = manager(Duration::from_secs(60)).run(session, codec()).await;
        assert!(matches!(err, SessionError::Closed(_)));
    }

    #[tokio::test]
    async fn receive_error_is_network() {
        let (session, inbound, _outbound) = memory_session();
        inbound
            .unbounded_send(Err(tungstenite::Error::ConnectionClosed))
            .unwrap();

        let err = manager(Duration::from_secs(60)).run(session, codec()).await;
        assert_eq!(err.stage(), Some(Stage::Receive));
    }

    #[tokio::test]
    async fn heartbeat_send_failure_is_network() {
        let (session, _inbound, outbound) = memory_session();
        drop(outbound);

        let heartbeat = manager(Duration::from_millis(10));
        let err = heartbeat.run(session, codec()).await;

        assert_eq!(err.stage(), Some(Stage::Heartbeat));
        assert_eq!(heartbeat.state().pings_sent(), 0);
    }

    #[tokio::test]
    async fn sends_ping_each_interval() {
        let (session, inbound, mut outbound) = memory_session();
        let heartbeat = Arc::new(manager(Duration::from_millis(10)));

        let running = {
            let heartbeat = Arc::clone(&heartbeat);
            tokio::spawn(async move { heartbeat.run(session, codec()).await })
        };

        for _ in 0..2 {
            let frame = outbound.next().await.unwrap();
            assert_eq!(frame, Message::Text(PING_FRAME.into()));
        }

        drop(inbound);
        let err = running.await.unwrap();

        assert!(matches!(err, SessionError::Closed(_)));
        assert!(heartbeat.state().pings_sent() >= 2);
        assert!(heartbeat.state().last_ping().is_some());
    }

    #[tokio::test]
    async fn bad_frames_do_not_end_loop() {
        let (session, inbound, mut outbound) = memory_session();
        inbound.unbounded_send(text("pong")).unwrap();
        inbound
            .unbounded_send(text(r#"{"type":"newitems_go","data":"{oops"}"#))
            .unwrap();
        inbound
            .unbounded_send(text(
                r#"{"type":"newitems_go","data":"{\"i_market_name\":\"AK-47\"}"}"#,
            ))
            .unwrap();

        let running = tokio::spawn(async move {
            manager(Duration::from_millis(10)).run(session, codec()).await
        });

        // The loop is still alive if it keeps pinging after the bad frames.
        assert_eq!(
            outbound.next().await.unwrap(),
            Message::Text(PING_FRAME.into())
        );
        assert!(!running.is_finished());

        drop(inbound);
        assert!(matches!(running.await.unwrap(), SessionError::Closed(_)));
    }

    #[tokio::test]
    async fn zero_interval_is_clamped() {
        let (session, inbound, mut outbound) = memory_session();
        let running = tokio::spawn(async move {
            manager(Duration::ZERO).run(session, codec()).await
        });

        assert_eq!(
            outbound.next().await.unwrap(),
            Message::Text(PING_FRAME.into())
        );

        drop(inbound);
        assert!(matches!(running.await.unwrap(), SessionError::Closed(_)));
    }

    #[tokio::test]
    async fn oversized_interval_is_clamped() {
        let (session, inbound, _outbound) = memory_session();
        let heartbeat = Arc::new(manager(Duration::from_secs(u64::MAX)));

        let running = {
            let heartbeat = Arc::clone(&heartbeat);
            tokio::spawn(async move { heartbeat.run(session, codec()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!running.is_finished());

        drop(inbound);
        assert!(matches!(running.await.unwrap(), SessionError::Closed(_)));
        assert_eq!(heartbeat.state().pings_sent(), 0);
    }
}
