//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the reconnection supervisor and the port
//! interfaces it drives.

/// Port interfaces for the token endpoint and the feed transport.
pub mod ports;

/// Application services (the reconnection supervisor).
pub mod services;
