//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Market feed adapters (token exchange, WebSocket session, codec).
pub mod market;

/// Configuration loaded from the environment.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Log file sink, tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
