//! Logging and Tracing Setup
//!
//! Every run writes to its own file, `market_watcher_<YYYYmmdd_HHMMSS>.log`,
//! inside the configured log directory. Logs can be mirrored to stderr and
//! exported to an OTLP collector.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: Set to "true" to export traces (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4318)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: market-watcher)
//! - `RUST_LOG`: Extra filter directives
//!
//! # Usage
//!
//! ```ignore
//! use market_watcher::infrastructure::telemetry::{self, TelemetryConfig};
//!
//! // Initialize at startup (returns guard that must be kept alive)
//! let guard = telemetry::init(TelemetryConfig::from_env(&config.log))?;
//! tracing::info!(path = %guard.log_path().display(), "Logging to file");
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::infrastructure::config::LogSettings;

/// Service name for OpenTelemetry traces.
const DEFAULT_SERVICE_NAME: &str = "market-watcher";

/// Default OTLP endpoint.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Errors raised while setting up logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Log directory could not be created.
    #[error("failed to create log directory {}: {source}", .path.display())]
    LogDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Log file could not be created.
    #[error("failed to create log file {}: {source}", .path.display())]
    LogFile {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// OTLP exporter could not be built.
    #[error("failed to create OTLP exporter: {0}")]
    Exporter(String),

    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Guard that keeps logging alive and shuts down OpenTelemetry when dropped.
pub struct TelemetryGuard {
    log_path: PathBuf,
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Path of this run's log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry tracer provider: {e}");
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether OpenTelemetry export is enabled.
    pub enabled: bool,
    /// OTLP exporter endpoint.
    pub otlp_endpoint: String,
    /// Service name for traces.
    pub service_name: String,
    /// Directory holding per-run log files.
    pub log_dir: PathBuf,
    /// Mirror log output to stderr.
    pub stderr: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let log = LogSettings::default();
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_dir: log.dir,
            stderr: log.stderr,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from log settings and OTEL environment variables.
    #[must_use]
    pub fn from_env(log: &LogSettings) -> Self {
        let enabled = std::env::var("OTEL_ENABLED")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());

        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());

        Self {
            enabled,
            otlp_endpoint,
            service_name,
            log_dir: log.dir.clone(),
            stderr: log.stderr,
        }
    }
}

// =============================================================================
// Log Sink
// =============================================================================

/// File name for a run started at `started`.
#[must_use]
pub fn log_file_name(started: NaiveDateTime) -> String {
    format!("market_watcher_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Create `dir` if needed and open a fresh log file inside it.
///
/// # Errors
///
/// Returns `LogDir` or `LogFile` if either step fails.
pub fn create_log_file(dir: &Path, started: NaiveDateTime) -> Result<(File, PathBuf), TelemetryError> {
    fs::create_dir_all(dir).map_err(|source| TelemetryError::LogDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(log_file_name(started));
    let file = File::create(&path).map_err(|source| TelemetryError::LogFile {
        path: path.clone(),
        source,
    })?;

    Ok((file, path))
}

// =============================================================================
// Subscriber Setup
// =============================================================================

/// Install the global subscriber.
///
/// Returns a guard that must be kept alive for the duration of the program.
///
/// # Errors
///
/// Fails if the log file cannot be created, the exporter cannot be built or
/// a subscriber is already installed.
#[allow(clippy::expect_used)]
pub fn init(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let (file, log_path) = create_log_file(&config.log_dir, Local::now().naive_local())?;

    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "market_watcher=info"
                .parse()
                .expect("static directive 'market_watcher=info' is valid"),
        )
        .add_directive(
            "listing=info"
                .parse()
                .expect("static directive 'listing=info' is valid"),
        )
        .add_directive(
            "hyper=warn"
                .parse()
                .expect("static directive 'hyper=warn' is valid"),
        );

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
    });

    let tracer_provider = if config.enabled {
        let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otlp_endpoint)
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(otlp_exporter)
                .with_resource(
                    opentelemetry_sdk::Resource::builder()
                        .with_service_name(config.service_name.clone())
                        .build(),
                )
                .build(),
        )
    } else {
        None
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    Ok(TelemetryGuard {
        log_path,
        tracer_provider,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(7, 8, 9))
            .unwrap()
    }

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.otlp_endpoint, DEFAULT_OTLP_ENDPOINT);
        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn file_name_uses_start_timestamp() {
        assert_eq!(log_file_name(started()), "market_watcher_20240305_070809.log");
    }

    #[test]
    fn creates_directory_and_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("logs");

        let (_file, path) = create_log_file(&dir, started()).unwrap();

        assert!(path.is_file());
        assert_eq!(path, dir.join("market_watcher_20240305_070809.log"));
    }

    #[test]
    fn directory_blocked_by_file_is_error() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("logs");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = create_log_file(&blocker, started()).unwrap_err();

        assert!(matches!(err, TelemetryError::LogDir { .. }));
        assert!(err.to_string().contains("logs"));
    }
}
