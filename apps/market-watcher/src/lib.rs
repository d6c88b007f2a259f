#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Market Watcher - New Listing Feed Logger
//!
//! Keeps one authenticated WebSocket subscription to the market's
//! new-listing feed alive and writes every announced item to a per-run
//! log file.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types with no I/O
//!   - `listing`: Item record, field extraction policy, rendering
//!   - `session`: Session token expiry and the retry counter
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the token endpoint and the feed transport
//!   - `services`: The reconnection supervisor (`Watcher`)
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `market`: Token client, WebSocket session, codec, heartbeat loop
//!   - `config`: Environment-driven settings
//!   - `telemetry`: Log file sink and tracing subscriber
//!   - `metrics`: Prometheus instrumentation
//!
//! # Data Flow
//!
//! ```text
//! Token endpoint ──► Watcher ──► WsConnector ──► FeedSession
//!                       ▲                             │
//!                       │ failure                     ▼
//!                       └──────── HeartbeatManager ◄── frames ──► ListingCodec ──► log file
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Listing records and session bookkeeping.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::listing::{ItemField, ItemRecord};
pub use domain::session::{RetryCounter, SessionToken};

// Application
pub use application::ports::{FeedConnector, TokenSource};
pub use application::services::{CycleError, Watcher, WatcherError, WatcherState};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, FeedSettings, LogSettings, RetrySettings, TokenSettings, WatcherConfig,
};

// Market feed adapters
pub use infrastructure::market::{
    CodecError, DecodedFrame, FeedSession, ListingCodec, SessionError, TokenClient, TokenError,
    WsConnector,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
