//! Market Watcher Binary
//!
//! Subscribes to the market's new-listing feed and logs every announced
//! item to `logs/market_watcher_<timestamp>.log`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-watcher
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKET_API_KEY`: Market API key used to obtain feed tokens
//!
//! ## Optional
//! - `MARKET_TOKEN_URL`: Token endpoint
//! - `MARKET_FEED_URL`: Feed WebSocket endpoint
//! - `MARKET_FEED_ORIGIN`: Origin header sent on connect
//! - `MARKET_FEED_CHANNEL`: Channel to subscribe to (default: newitems_go)
//! - `WATCHER_RECONNECT_DELAY_SECS`: Delay between attempts (default: 5)
//! - `WATCHER_MAX_RETRIES`: Failed cycles before giving up (default: 5)
//! - `WATCHER_HEARTBEAT_INTERVAL_SECS`: Keep-alive interval (default: 45)
//! - `WATCHER_LOG_DIR`: Log directory (default: logs)
//! - `WATCHER_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Extra log filter directives
//!
//! The process exits non-zero once the retry budget is spent.

use anyhow::Context;
use market_watcher::infrastructure::market::{TokenClient, WsConnector};
use market_watcher::infrastructure::telemetry::{self, TelemetryConfig};
use market_watcher::{Watcher, WatcherConfig, init_metrics};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    load_dotenv();

    let config = WatcherConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive until exit so the log file and exporter flush.
    let telemetry_guard = telemetry::init(TelemetryConfig::from_env(&config.log))
        .context("failed to initialize logging")?;

    tracing::info!(
        log_file = %telemetry_guard.log_path().display(),
        "Starting Market Watcher"
    );
    log_config(&config);

    init_metrics(config.log.metrics_port).context("failed to start metrics exporter")?;

    let tokens = TokenClient::new(&config.token).context("failed to build token client")?;
    let connector = WsConnector::new(config.feed.clone());
    let mut watcher = Watcher::new(tokens, connector, &config);

    tokio::select! {
        error = watcher.run() => {
            tracing::error!(error = %error, "Watcher stopped");
            Err(error.into())
        }
        () = await_ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &WatcherConfig) {
    tracing::info!(
        feed_url = %config.feed.url,
        channels = ?config.feed.channels,
        max_retries = config.retry.max_retries,
        reconnect_delay_secs = config.retry.reconnect_delay.as_secs(),
        heartbeat_interval_secs = config.feed.heartbeat_interval.as_secs(),
        metrics_port = config.log.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(token_url = %config.token.url, "Token endpoint");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Resolve on Ctrl+C. Never resolves if the handler cannot be installed.
async fn await_ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}
