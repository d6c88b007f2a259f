//! Prometheus Metrics Module
//!
//! Exposes watcher metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Items logged, frames ignored, decode failures by kind
//! - **Connection**: Connected gauge, reconnects, heartbeats sent
//! - **Tokens**: Token refresh outcomes
//!
//! # Integration
//!
//! When a metrics port is configured the exporter serves `/metrics` on it.
//! Without a port no recorder is installed and every recording function
//! below is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter Setup
// =============================================================================

/// Install the Prometheus recorder and HTTP listener.
///
/// Must be called from within a Tokio runtime. A port of `0` disables the
/// exporter.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    if port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    register_metrics();
    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_watcher_items_total",
        "Total new-listing items decoded and logged"
    );
    describe_counter!(
        "market_watcher_frames_ignored_total",
        "Total frames dropped because they are not item announcements"
    );
    describe_counter!(
        "market_watcher_decode_errors_total",
        "Total frames that failed to decode, by kind"
    );
    describe_counter!(
        "market_watcher_reconnects_total",
        "Total reconnection attempts after a failed cycle"
    );
    describe_counter!(
        "market_watcher_token_refreshes_total",
        "Total token refresh attempts by outcome"
    );
    describe_counter!(
        "market_watcher_heartbeats_total",
        "Total keep-alive frames sent"
    );
    describe_gauge!(
        "market_watcher_connected",
        "1 while a feed session is live, 0 otherwise"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for decode failures.
#[derive(Debug, Clone, Copy)]
pub enum DecodeErrorKind {
    /// Frame was not JSON at all.
    NotJson,
    /// Item payload could not be parsed.
    Payload,
}

impl DecodeErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NotJson => "not_json",
            Self::Payload => "payload",
        }
    }
}

/// Metric labels for token refresh outcomes.
#[derive(Debug, Clone, Copy)]
pub enum TokenOutcome {
    /// New token issued.
    Issued,
    /// Request or transport failure.
    Network,
    /// Response body could not be decoded.
    Parse,
    /// Endpoint reported failure.
    Remote,
}

impl TokenOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Remote => "remote",
        }
    }
}

/// Record an item written to the log.
pub fn record_item() {
    counter!("market_watcher_items_total").increment(1);
}

/// Record a frame that was not an item announcement.
pub fn record_ignored_frame() {
    counter!("market_watcher_frames_ignored_total").increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error(kind: DecodeErrorKind) {
    counter!(
        "market_watcher_decode_errors_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("market_watcher_reconnects_total").increment(1);
}

/// Record a token refresh attempt.
pub fn record_token_refresh(outcome: TokenOutcome) {
    counter!(
        "market_watcher_token_refreshes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a keep-alive frame sent.
pub fn record_heartbeat() {
    counter!("market_watcher_heartbeats_total").increment(1);
}

/// Update the connected gauge.
pub fn set_connected(connected: bool) {
    gauge!("market_watcher_connected").set(if connected { 1.0 } else { 0.0 });
}

// =============================================================================
// Tests
// =============================================================================
